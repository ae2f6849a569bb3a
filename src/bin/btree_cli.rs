//! Simple CLI for poking at an in-memory B+ tree by hand.
//!
//! Usage:
//!   btree_cli insert <key> <value>...
//!   btree_cli find <key> <value>...
//!   btree_cli scan <key> <value>...
//!   btree_cli stats <key> <value>...
//!   btree_cli bulk_insert <count>
//!
//! Each run opens a fresh, empty tree: every positional `insert`/`find` pair
//! after the command name feeds one operation, newest-first, so a single
//! invocation can build up a small tree and then query it in one shot, e.g.:
//!
//!   btree_cli insert 1 one insert 2 two find 1

use bptree_storage::Db;
use std::env;
use std::process::exit;

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() {
        usage_and_exit();
    }

    let db = Db::with_default_config();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "insert" => {
                let (key, value) = match (args.get(i + 1), args.get(i + 2)) {
                    (Some(k), Some(v)) => (k, v),
                    _ => usage_and_exit(),
                };
                let key: u32 = parse_key(key);
                match db.insert(key, value.as_bytes()) {
                    Ok(true) => println!("OK"),
                    Ok(false) => println!("DUPLICATE"),
                    Err(e) => fail(&e),
                }
                i += 3;
            }
            "find" => {
                let key = match args.get(i + 1) {
                    Some(k) => k,
                    None => usage_and_exit(),
                };
                let key: u32 = parse_key(key);
                match db.get(key) {
                    Ok(Some(value)) => match String::from_utf8(value) {
                        Ok(s) => println!("{s}"),
                        Err(_) => println!("<binary data>"),
                    },
                    Ok(None) => println!("NOT_FOUND"),
                    Err(e) => fail(&e),
                }
                i += 2;
            }
            "scan" => {
                match db.iter() {
                    Ok(pairs) => {
                        println!("COUNT: {}", pairs.len());
                        for (key, value) in pairs {
                            println!("{key} -> {}", String::from_utf8_lossy(&value));
                        }
                    }
                    Err(e) => fail(&e),
                }
                i += 1;
            }
            "stats" => {
                match db.stats() {
                    Ok(stats) => {
                        println!("page_count: {}", stats.page_count);
                        println!("pager_capacity: {}", stats.pager_capacity);
                        println!("tree_height: {}", stats.tree_height);
                    }
                    Err(e) => fail(&e),
                }
                i += 1;
            }
            "bulk_insert" => {
                let count: usize = match args.get(i + 1).and_then(|s| s.parse().ok()) {
                    Some(n) => n,
                    None => usage_and_exit(),
                };
                let start = std::time::Instant::now();
                for n in 0..count as u32 {
                    if let Err(e) = db.insert(n, format!("value_{n}").as_bytes()) {
                        fail(&e);
                    }
                }
                let elapsed = start.elapsed();
                let ops_per_sec = count as f64 / elapsed.as_secs_f64();
                println!("INSERTED: {count}");
                println!("TIME_MS: {}", elapsed.as_millis());
                println!("OPS_PER_SEC: {ops_per_sec:.0}");
                i += 2;
            }
            other => {
                eprintln!("Unknown command: {other}");
                usage_and_exit();
            }
        }
    }
}

fn parse_key(s: &str) -> u32 {
    s.parse().unwrap_or_else(|_| {
        eprintln!("ERROR: key must be a u32, got {s:?}");
        exit(1);
    })
}

fn fail(e: &bptree_storage::StorageError) -> ! {
    eprintln!("ERROR: {e}");
    exit(1);
}

fn usage_and_exit() -> ! {
    eprintln!("Usage: btree_cli <command> [args...] [<command> [args...] ...]");
    eprintln!("Commands:");
    eprintln!("  insert <key> <value> - Insert a key-value pair");
    eprintln!("  find <key>           - Look up a key");
    eprintln!("  scan                 - Print every key in order");
    eprintln!("  stats                - Show tree statistics");
    eprintln!("  bulk_insert <count>  - Insert count sequential test records");
    exit(1);
}

use std::sync::Arc;

use quarry::buffer::BufferPoolManager;
use quarry::index::BPlusTree;
use quarry::storage::disk::DiskManager;
use quarry::{PageId, RecordId, SlotId};

fn main() {
    env_logger::init();

    println!("Quarry - disk-oriented storage engine core");
    println!("==========================================\n");

    let db_path = "demo.db";

    let disk_manager = Arc::new(DiskManager::new(db_path).expect("Failed to create disk manager"));
    println!("Created disk manager for: {}", db_path);

    // Buffer pool with 16 frames and LRU-2 replacement
    let bpm = Arc::new(BufferPoolManager::new(16, 2, disk_manager));
    println!("Created buffer pool manager with 16 frames\n");

    // Small fanout so a handful of keys already exercises splits
    let tree = BPlusTree::new(Arc::clone(&bpm), 4, 4).expect("Failed to create index");
    println!("Created B+ tree index (header page {})", tree.header_page_id());

    for key in [5u32, 3, 8, 1, 9, 2, 7, 4, 6] {
        let rid = RecordId::new(PageId::new(key as i32), SlotId::new(0));
        tree.insert(key, rid).expect("Failed to insert");
    }
    println!("Inserted 9 keys\n");

    println!("Tree structure:");
    print!("{}", tree.pretty_print().expect("Failed to render tree"));

    let probe = 7;
    match tree.get(probe).expect("Failed to search") {
        Some(rid) => println!("\nget({}) -> {:?}", probe, rid),
        None => println!("\nget({}) -> not found", probe),
    }

    print!("\nForward scan: ");
    let mut iter = tree.iter().expect("Failed to create iterator");
    while let Some((key, _rid)) = iter.next().expect("Iterator failed") {
        print!("{} ", key);
    }
    println!();

    tree.remove(5).expect("Failed to remove");
    tree.remove(6).expect("Failed to remove");
    println!("\nAfter removing 5 and 6:");
    print!("{}", tree.pretty_print().expect("Failed to render tree"));

    bpm.flush_all_pages().expect("Failed to flush");
    println!("\nFlushed all pages to disk");

    std::fs::remove_file(db_path).ok();
    println!("Demo completed successfully!");
}

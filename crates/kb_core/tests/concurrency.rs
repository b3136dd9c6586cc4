use kb_core::db::open_db;
use kb_core::{
    EntryRepository, LinkRepository, SqliteEntryRepository, SqliteLinkRepository,
    SqliteTagRepository, TagRepository,
};
use std::path::PathBuf;
use std::sync::{Arc, Barrier};
use std::thread;

const WORKERS: usize = 8;

fn run_workers<T: Send + 'static>(
    path: PathBuf,
    work: impl Fn(&rusqlite::Connection, usize) -> T + Send + Sync + 'static,
) -> Vec<T> {
    // Create the schema up front so workers only race on data.
    drop(open_db(&path).unwrap());

    let barrier = Arc::new(Barrier::new(WORKERS));
    let work = Arc::new(work);
    let handles: Vec<_> = (0..WORKERS)
        .map(|index| {
            let barrier = Arc::clone(&barrier);
            let work = Arc::clone(&work);
            let path = path.clone();
            thread::spawn(move || {
                let conn = open_db(&path).unwrap();
                barrier.wait();
                (*work)(&conn, index)
            })
        })
        .collect();

    handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect()
}

#[test]
fn concurrent_get_or_create_converges_on_one_tag() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kb.db");

    let ids = run_workers(path.clone(), |conn, _| {
        SqliteTagRepository::new(conn)
            .get_or_create_tag("shared", None)
            .unwrap()
            .id
    });

    assert!(ids.windows(2).all(|pair| pair[0] == pair[1]));
    let conn = open_db(&path).unwrap();
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM tags WHERE name = 'shared';", [], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn concurrent_links_to_one_pair_leave_a_single_row() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kb.db");

    let (entry_id, tag_id) = {
        let conn = open_db(&path).unwrap();
        let entry = SqliteEntryRepository::new(&conn)
            .create_entry("contended")
            .unwrap();
        let tag = SqliteTagRepository::new(&conn)
            .get_or_create_tag("hot", None)
            .unwrap();
        (entry.id, tag.id)
    };

    run_workers(path.clone(), move |conn, index| {
        let confidence = (index as f64) / (WORKERS as f64);
        SqliteLinkRepository::new(conn)
            .link_entry_tag(entry_id, tag_id, confidence)
            .unwrap();
    });

    let conn = open_db(&path).unwrap();
    let links = SqliteLinkRepository::new(&conn).tag_links_of(entry_id).unwrap();
    assert_eq!(links.len(), 1);
    assert!((0.0..=1.0).contains(&links[0].confidence));
}

#[test]
fn concurrent_captures_all_persist() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kb.db");

    run_workers(path.clone(), |conn, index| {
        let entries = SqliteEntryRepository::new(conn);
        let tags = SqliteTagRepository::new(conn);
        let links = SqliteLinkRepository::new(conn);
        let entry = entries.create_entry(&format!("note {index}")).unwrap();
        let parent = tags.get_or_create_tag("programming", None).unwrap();
        let tag = tags.get_or_create_tag("rust", Some(parent.id)).unwrap();
        links.link_entry_tag(entry.id, tag.id, 0.5).unwrap();
    });

    let conn = open_db(&path).unwrap();
    let total: i64 = conn
        .query_row("SELECT COUNT(*) FROM entries;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(total, WORKERS as i64);
    let tag_count: i64 = conn
        .query_row("SELECT COUNT(*) FROM tags;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(tag_count, 2);
    let link_count: i64 = conn
        .query_row("SELECT COUNT(*) FROM entry_tags;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(link_count, WORKERS as i64);
}

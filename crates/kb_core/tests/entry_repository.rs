use kb_core::db::open_db_in_memory;
use kb_core::{
    EmbeddingRepository, EntryListQuery, EntryRepository, EntryService, ErrorKind,
    LinkRepository, RepoError, SqliteEmbeddingRepository, SqliteEntryRepository,
    SqliteLinkRepository, SqliteTagRepository, TagRepository,
};
use rusqlite::{params, Connection};
use uuid::Uuid;

fn set_created_at(conn: &Connection, id: Uuid, created_at: i64) {
    conn.execute(
        "UPDATE entries SET created_at = ?2 WHERE id = ?1;",
        params![id.to_string(), created_at],
    )
    .unwrap();
}

fn count(conn: &Connection, sql: &str, id: Uuid) -> i64 {
    conn.query_row(sql, [id.to_string()], |row| row.get(0))
        .unwrap()
}

#[test]
fn create_and_get_round_trip() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEntryRepository::new(&conn);

    let created = repo.create_entry("  Go channels are typed conduits  ").unwrap();
    let loaded = repo.get_entry(created.id).unwrap().unwrap();

    assert_eq!(loaded.content, "  Go channels are typed conduits  ");
    assert_eq!(loaded.created_at, created.created_at);
    assert_eq!(loaded.last_viewed_at, None);
    assert!(loaded.tags.is_empty());
}

#[test]
fn blank_content_is_invalid_input() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEntryRepository::new(&conn);

    let err = repo.create_entry(" \n\t ").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    let total: i64 = conn
        .query_row("SELECT COUNT(*) FROM entries;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(total, 0);
}

#[test]
fn unknown_entry_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let service = EntryService::new(SqliteEntryRepository::new(&conn));
    let missing = Uuid::new_v4();

    assert!(matches!(
        service.get_entry(missing),
        Err(RepoError::EntryNotFound(id)) if id == missing
    ));
    assert_eq!(
        service.delete_entry(missing).unwrap_err().kind(),
        ErrorKind::NotFound
    );
    assert_eq!(
        service.touch_viewed(missing).unwrap_err().kind(),
        ErrorKind::NotFound
    );
}

#[test]
fn list_is_newest_first_with_pagination() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEntryRepository::new(&conn);

    let mut ids = Vec::new();
    for (index, content) in ["first", "second", "third"].into_iter().enumerate() {
        let entry = repo.create_entry(content).unwrap();
        set_created_at(&conn, entry.id, 1_000 + index as i64);
        ids.push(entry.id);
    }

    let all = repo.list_entries(&EntryListQuery::default()).unwrap();
    let contents: Vec<&str> = all.iter().map(|entry| entry.content.as_str()).collect();
    assert_eq!(contents, vec!["third", "second", "first"]);

    let page = repo
        .list_entries(&EntryListQuery {
            limit: Some(1),
            offset: 1,
        })
        .unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].id, ids[1]);

    let past_end = repo
        .list_entries(&EntryListQuery {
            limit: Some(10),
            offset: 10,
        })
        .unwrap();
    assert!(past_end.is_empty());
}

#[test]
fn list_ties_are_broken_by_id() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEntryRepository::new(&conn);

    let a = repo.create_entry("a").unwrap();
    let b = repo.create_entry("b").unwrap();
    set_created_at(&conn, a.id, 5);
    set_created_at(&conn, b.id, 5);

    let listed = repo.list_entries(&EntryListQuery::default()).unwrap();
    let mut expected = vec![a.id, b.id];
    expected.sort();
    let actual: Vec<Uuid> = listed.iter().map(|entry| entry.id).collect();
    assert_eq!(actual, expected);
}

#[test]
fn list_limit_defaults_and_clamps() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEntryRepository::new(&conn);
    for index in 0..205 {
        repo.create_entry(&format!("entry {index}")).unwrap();
    }

    let default_page = repo
        .list_entries(&EntryListQuery {
            limit: Some(0),
            offset: 0,
        })
        .unwrap();
    assert_eq!(default_page.len(), 20);

    let clamped = repo
        .list_entries(&EntryListQuery {
            limit: Some(1_000),
            offset: 0,
        })
        .unwrap();
    assert_eq!(clamped.len(), 200);
}

#[test]
fn search_is_case_insensitive_substring_match() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEntryRepository::new(&conn);

    let go = repo.create_entry("Learning GoLang channels").unwrap();
    let rust = repo.create_entry("Rust ownership rules").unwrap();
    repo.create_entry("Sourdough starter").unwrap();
    set_created_at(&conn, go.id, 10);
    set_created_at(&conn, rust.id, 20);

    let hits = repo.search_entries("golang").unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, go.id);

    let hits = repo.search_entries("RU").unwrap();
    let ids: Vec<Uuid> = hits.iter().map(|entry| entry.id).collect();
    assert_eq!(ids, vec![rust.id]);

    assert!(repo.search_entries("kubernetes").unwrap().is_empty());
    assert_eq!(
        repo.search_entries("   ").unwrap_err().kind(),
        ErrorKind::InvalidInput
    );
}

#[test]
fn delete_cascades_links_and_embedding() {
    let conn = open_db_in_memory().unwrap();
    let entries = SqliteEntryRepository::new(&conn);
    let tags = SqliteTagRepository::new(&conn);
    let links = SqliteLinkRepository::new(&conn);
    let embeddings = SqliteEmbeddingRepository::new(&conn);

    let entry = entries.create_entry("doomed").unwrap();
    let tag = tags.get_or_create_tag("misc", None).unwrap();
    links.link_entry_tag(entry.id, tag.id, 0.7).unwrap();
    embeddings
        .save_embedding(entry.id, &[0.1, 0.2], "test-model")
        .unwrap();

    entries.delete_entry(entry.id).unwrap();

    assert!(entries.get_entry(entry.id).unwrap().is_none());
    assert_eq!(
        count(&conn, "SELECT COUNT(*) FROM entry_tags WHERE entry_id = ?1;", entry.id),
        0
    );
    assert_eq!(
        count(&conn, "SELECT COUNT(*) FROM embeddings WHERE entry_id = ?1;", entry.id),
        0
    );
    assert!(tags.get_tag(tag.id).unwrap().is_some());
    assert_eq!(
        entries.delete_entry(entry.id).unwrap_err().kind(),
        ErrorKind::NotFound
    );
}

#[test]
fn open_entry_touches_last_viewed() {
    let conn = open_db_in_memory().unwrap();
    let service = EntryService::new(SqliteEntryRepository::new(&conn));

    let entry = service.create_entry("look at me").unwrap();
    assert!(entry.never_viewed());

    let opened = service.open_entry(entry.id).unwrap();
    let viewed_at = opened.last_viewed_at.unwrap();
    assert!(viewed_at >= entry.created_at);
    assert_eq!(
        service.get_entry(entry.id).unwrap().last_viewed_at,
        Some(viewed_at)
    );
}

//! End-to-end archival through the public API.

use std::sync::Arc;

use archivist_core::{
    ArchiveOptions, Archivist, AssociationDef, Catalog, DeleteRequest, Dependent, EntityDef,
    Predicate, SqliteStore, Store, Value,
};
use chrono::{DateTime, TimeZone, Utc};
use pretty_assertions::assert_eq;

const STAMP: &str = "2024-05-04 10:00:00.000000";

fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 4, 10, 0, 0).unwrap()
}

struct TestContext {
    archivist: Archivist<SqliteStore>,
    _dir: tempfile::TempDir,
}

impl TestContext {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("blog.db")).unwrap();
        store
            .execute_batch(
                r#"
            CREATE TABLE posts (
                id INTEGER PRIMARY KEY,
                title TEXT NOT NULL,
                author_id INTEGER NOT NULL,
                deleted_at DATETIME
            );
            CREATE TABLE comments (
                id INTEGER PRIMARY KEY,
                post_id INTEGER NOT NULL,
                body TEXT
            );
            INSERT INTO posts (id, title, author_id) VALUES
                (1, 'first', 5), (2, 'second', 5), (3, 'third', 7), (4, 'fourth', 5), (5, 'fifth', 8);
            INSERT INTO comments (id, post_id, body) VALUES
                (10, 1, 'nice'), (11, 1, 'meh'), (12, 3, 'great');
            "#,
            )
            .unwrap();

        let catalog = Catalog::with_entities([
            EntityDef::new("Post", "posts").with_association(
                AssociationDef::has_many("comments", "Comment", "post_id")
                    .with_dependent(Dependent::Destroy),
            ),
            EntityDef::new("Comment", "comments"),
        ]);
        let archivist = Archivist::new(store, Arc::new(catalog)).with_clock(fixed_now);

        Self {
            archivist,
            _dir: dir,
        }
    }

    fn register_all(&self) {
        self.archivist
            .register("Post", ArchiveOptions::new())
            .unwrap();
        self.archivist
            .register("Comment", ArchiveOptions::new())
            .unwrap();
    }

    fn count(&self, table: &str, predicate: Predicate) -> u64 {
        self.archivist.store().count(table, &predicate).unwrap()
    }

    fn ids(&self, table: &str) -> Vec<Value> {
        self.archivist
            .store()
            .select_column(table, "id", &Predicate::All)
            .unwrap()
    }
}

#[test]
fn test_delete_by_author_archives_matching_posts() {
    let ctx = TestContext::new();
    ctx.register_all();

    let deleted = ctx
        .archivist
        .execute("DELETE FROM posts WHERE author_id = 5")
        .unwrap();

    assert_eq!(deleted, 3);
    assert_eq!(ctx.count("posts", Predicate::eq("author_id", 5)), 0);
    assert_eq!(ctx.count("posts", Predicate::All), 2);
    assert_eq!(ctx.count("archived_posts", Predicate::eq("author_id", 5)), 3);
    assert_eq!(ctx.count("archived_posts", Predicate::eq("deleted_at", STAMP)), 3);
    assert_eq!(ctx.count("archived_posts", Predicate::not_eq("author_id", 5)), 0);
}

#[test]
fn test_archived_row_keeps_original_values() {
    let ctx = TestContext::new();
    ctx.register_all();

    ctx.archivist
        .delete(&DeleteRequest::new("posts", Predicate::eq("id", 3)))
        .unwrap();

    let titles = ctx
        .archivist
        .store()
        .select_column("archived_posts", "title", &Predicate::eq("id", 3))
        .unwrap();
    assert_eq!(titles, vec![Value::from("third")]);
    assert_eq!(ctx.ids("archived_posts"), vec![Value::Integer(3)]);
}

#[test]
fn test_destroy_cascades_into_comment_archive() {
    let ctx = TestContext::new();
    ctx.register_all();

    let deleted = ctx.archivist.destroy("Post", 1).unwrap();

    assert_eq!(deleted, 3);
    assert_eq!(ctx.count("posts", Predicate::eq("id", 1)), 0);
    assert_eq!(ctx.count("archived_posts", Predicate::eq("id", 1)), 1);
    assert_eq!(ctx.count("comments", Predicate::eq("post_id", 1)), 0);
    assert_eq!(ctx.count("archived_comments", Predicate::eq("post_id", 1)), 2);
    assert_eq!(ctx.count("comments", Predicate::All), 1);
}

#[test]
fn test_repeated_register_keeps_one_binding() {
    let ctx = TestContext::new();
    for _ in 0..3 {
        ctx.archivist
            .register("Post", ArchiveOptions::new())
            .unwrap();
    }
    assert_eq!(ctx.archivist.find(&["Post"]).len(), 1);
    assert_eq!(ctx.archivist.find_tables(&["posts"]).len(), 1);
}

#[test]
fn test_restore_round_trip() {
    let ctx = TestContext::new();
    ctx.register_all();

    ctx.archivist.destroy("Post", 1).unwrap();
    let restored = ctx.archivist.restore("Post", Predicate::eq("id", 1)).unwrap();

    assert_eq!(restored, 3);
    assert_eq!(ctx.count("archived_posts", Predicate::All), 0);
    assert_eq!(ctx.count("archived_comments", Predicate::All), 0);
    assert_eq!(ctx.count("comments", Predicate::eq("post_id", 1)), 2);

    let store = ctx.archivist.store();
    let title = store
        .select_column("posts", "title", &Predicate::eq("id", 1))
        .unwrap();
    assert_eq!(title, vec![Value::from("first")]);
    assert_eq!(
        store
            .select_column("posts", "deleted_at", &Predicate::eq("id", 1))
            .unwrap(),
        vec![Value::Null]
    );
}

#[test]
fn test_legacy_migration_moves_only_soft_deleted_rows() {
    let ctx = TestContext::new();
    ctx.archivist
        .store()
        .execute("DELETE FROM posts WHERE id IN (4, 5)")
        .unwrap();
    ctx.archivist
        .store()
        .execute("UPDATE posts SET deleted_at = '2020-01-01 00:00:00' WHERE id IN (1, 2, 3)")
        .unwrap();
    ctx.archivist
        .store()
        .execute("INSERT INTO posts (id, title, author_id) VALUES (4, 'live', 1), (5, 'live', 2)")
        .unwrap();
    ctx.register_all();

    let report = ctx.archivist.run_legacy_migration("Post").unwrap();

    assert_eq!(report.moved, 3);
    assert_eq!(ctx.count("posts", Predicate::All), 2);
    assert_eq!(ctx.count("posts", Predicate::is_not_null("deleted_at")), 0);
    assert_eq!(
        ctx.count("archived_posts", Predicate::eq("deleted_at", "2020-01-01 00:00:00")),
        3
    );

    let again = ctx.archivist.run_legacy_migration("Post").unwrap();
    assert_eq!(again.moved, 0);
}

#[test]
fn test_disabled_delete_is_not_archived() {
    let ctx = TestContext::new();
    ctx.register_all();

    let deleted = ctx
        .archivist
        .disable(|| ctx.archivist.execute("DELETE FROM posts WHERE author_id = 5"))
        .unwrap();

    assert_eq!(deleted, 3);
    assert_eq!(ctx.count("posts", Predicate::eq("author_id", 5)), 0);
    assert_eq!(ctx.count("archived_posts", Predicate::All), 0);
}

#[test]
fn test_bulk_primitives_do_not_archive() {
    let ctx = TestContext::new();
    ctx.register_all();

    ctx.archivist
        .delete_all("Comment", Predicate::eq("post_id", 3))
        .unwrap();
    ctx.archivist
        .destroy_all("Post", Predicate::eq("author_id", 5))
        .unwrap();

    assert_eq!(ctx.count("posts", Predicate::All), 2);
    assert_eq!(ctx.count("comments", Predicate::All), 0);
    assert_eq!(ctx.count("archived_posts", Predicate::All), 0);
    assert_eq!(ctx.count("archived_comments", Predicate::All), 0);
}

#[test]
fn test_archive_all_moves_exactly_matching_rows() {
    let ctx = TestContext::new();
    ctx.register_all();

    let archived = ctx
        .archivist
        .archive_all("Post", Some("author_id = 5"))
        .unwrap();

    assert_eq!(archived, 5);
    assert_eq!(
        ctx.ids("posts"),
        vec![Value::Integer(3), Value::Integer(5)]
    );
    assert_eq!(ctx.count("archived_posts", Predicate::All), 3);
    assert_eq!(ctx.count("archived_comments", Predicate::All), 2);
}

#[test]
fn test_binding_conditions_limit_archival() {
    let ctx = TestContext::new();
    ctx.archivist
        .register("Post", ArchiveOptions::new().with_conditions("author_id <> 8"))
        .unwrap();

    ctx.archivist.execute("DELETE FROM posts").unwrap();

    assert_eq!(ctx.count("posts", Predicate::All), 0);
    assert_eq!(ctx.count("archived_posts", Predicate::All), 4);
    assert_eq!(ctx.count("archived_posts", Predicate::eq("author_id", 8)), 0);
}

#[test]
fn test_schema_sync_picks_up_new_columns() {
    let ctx = TestContext::new();
    ctx.register_all();
    ctx.archivist
        .store()
        .execute("ALTER TABLE posts ADD COLUMN slug TEXT")
        .unwrap();
    ctx.archivist
        .store()
        .execute("UPDATE posts SET slug = 'post-' || id")
        .unwrap();

    let report = ctx.archivist.sync_schema().unwrap();
    assert_eq!(report.added.len(), 1);

    ctx.archivist.destroy("Post", 2).unwrap();
    let slugs = ctx
        .archivist
        .store()
        .select_column("archived_posts", "slug", &Predicate::eq("id", 2))
        .unwrap();
    assert_eq!(slugs, vec![Value::from("post-2")]);
}

#[test]
fn test_table_name_spellings_are_archived() {
    let ctx = TestContext::new();
    ctx.register_all();

    for sql in [
        "DELETE FROM POSTS WHERE id = 1",
        "DELETE FROM \"posts\" WHERE id = 2",
        "DELETE FROM `Posts` WHERE id = 3",
        "DELETE FROM main.posts WHERE id = 4",
    ] {
        assert_eq!(ctx.archivist.execute(sql).unwrap(), 1);
    }
    ctx.archivist
        .delete(&DeleteRequest::new("POSTS", Predicate::eq("id", 5)))
        .unwrap();

    assert_eq!(ctx.count("posts", Predicate::All), 0);
    assert_eq!(ctx.count("archived_posts", Predicate::All), 5);
    assert_eq!(ctx.count("archived_posts", Predicate::eq("deleted_at", STAMP)), 5);
}

#[test]
fn test_reused_id_is_archived_again() {
    let ctx = TestContext::new();
    ctx.register_all();

    ctx.archivist.destroy("Post", 2).unwrap();
    ctx.archivist
        .store()
        .execute("INSERT INTO posts (id, title, author_id) VALUES (2, 'second again', 5)")
        .unwrap();
    ctx.archivist.destroy("Post", 2).unwrap();

    assert_eq!(ctx.count("posts", Predicate::eq("id", 2)), 0);
    assert_eq!(ctx.count("archived_posts", Predicate::eq("id", 2)), 2);
    let titles = ctx
        .archivist
        .store()
        .select_column("archived_posts", "title", &Predicate::eq("id", 2))
        .unwrap();
    assert_eq!(
        titles,
        vec![Value::from("second"), Value::from("second again")]
    );
}

#[test]
fn test_failed_destroy_leaves_no_partial_archive() {
    let ctx = TestContext::new();
    ctx.register_all();
    ctx.archivist
        .store()
        .execute_batch(
            r#"
        UPDATE posts SET title = 'locked' WHERE id = 1;
        CREATE TRIGGER posts_locked BEFORE DELETE ON posts WHEN OLD.title = 'locked'
        BEGIN SELECT RAISE(ABORT, 'post is locked'); END;
        "#,
        )
        .unwrap();

    assert!(ctx.archivist.destroy("Post", 1).is_err());

    assert_eq!(ctx.count("posts", Predicate::eq("id", 1)), 1);
    assert_eq!(ctx.count("comments", Predicate::eq("post_id", 1)), 2);
    assert_eq!(ctx.count("archived_posts", Predicate::All), 0);
    assert_eq!(ctx.count("archived_comments", Predicate::All), 0);

    assert_eq!(ctx.archivist.destroy("Post", 3).unwrap(), 2);
}

#[test]
fn test_copy_to_archive_leaves_rows_live() {
    let ctx = TestContext::new();
    ctx.register_all();

    let reports = ctx
        .archivist
        .copy_to_archive(&DeleteRequest::new("posts", Predicate::eq("author_id", 5)))
        .unwrap();

    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].copied, 3);
    assert_eq!(reports[0].deleted, 0);
    assert_eq!(ctx.count("posts", Predicate::All), 5);
    assert_eq!(ctx.count("archived_posts", Predicate::eq("deleted_at", STAMP)), 3);
}

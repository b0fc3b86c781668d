mod common;

use std::sync::Arc;

use autumn_orm::testing::RecordingConnection;
use autumn_orm::{
    Cursor, DatabaseValue, ModelError, PivotDescriptor, Record, Repository, Row, SqlDialect,
};
use common::{config, Profile, Tag, Team, User};

fn profile_row(id: i64, user_id: i64, bio: &str) -> Row {
    Row::new()
        .with("id", id)
        .with("user_id", user_id)
        .with("bio", bio)
}

fn user_tag() -> PivotDescriptor {
    PivotDescriptor::new("user_tag", "user_id", "tag_id", "users", "tags")
}

#[tokio::test]
async fn test_has_one_runs_once_per_record() {
    let connection = Arc::new(RecordingConnection::new());
    connection.push_result(Cursor::new(vec![profile_row(7, 1, "mathematician")]));
    let mut ada = Record::new(User::new(1, "Ada"));

    let first = ada
        .has_one::<Profile>(connection.as_ref(), None, None)
        .await
        .unwrap();
    let second = ada
        .has_one::<Profile>(connection.as_ref(), None, None)
        .await
        .unwrap();

    assert_eq!(first.as_ref().map(|p| p.bio.as_str()), Some("mathematician"));
    assert_eq!(first, second);
    assert_eq!(connection.call_count(), 1);
    assert_eq!(
        connection.last_sql().unwrap(),
        "SELECT * FROM profiles WHERE (user_id = :p0) LIMIT 1"
    );
    assert_eq!(
        connection.statements()[0].parameters.get("p0"),
        Some(&DatabaseValue::from(1i64))
    );
}

#[tokio::test]
async fn test_missing_related_record_is_memoized() {
    let connection = Arc::new(RecordingConnection::new());
    let mut ada = Record::new(User::new(1, "Ada"));

    for _ in 0..3 {
        let profile = ada
            .has_one::<Profile>(connection.as_ref(), None, None)
            .await
            .unwrap();
        assert!(profile.is_none());
    }
    assert_eq!(connection.call_count(), 1);
}

#[tokio::test]
async fn test_single_lookup_requires_key() {
    let connection = Arc::new(RecordingConnection::new());
    let mut ghost = Record::new(User::new(0, "Ghost"));

    let err = ghost
        .has_one::<Profile>(connection.as_ref(), None, None)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ModelError::MissingKey { ref table, ref column } if table == "users" && column == "id"
    ));
    assert_eq!(connection.call_count(), 0);
}

#[tokio::test]
async fn test_belongs_to_with_default_keys() {
    let connection = Arc::new(RecordingConnection::new());
    connection.push_result(Cursor::new(vec![Row::new()
        .with("id", 1i64)
        .with("name", "Ada")]));
    let mut profile = Record::new(Profile {
        id: 7,
        user_id: 1,
        bio: String::new(),
    });

    let owner = profile
        .belongs_to::<User>(connection.as_ref(), None, None)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(owner.name, "Ada");
    assert_eq!(
        connection.last_sql().unwrap(),
        "SELECT * FROM users WHERE deleted_at IS NULL AND (id = :p0) LIMIT 1"
    );
}

#[tokio::test]
async fn test_explicit_keys_get_their_own_cache_entry() {
    let connection = Arc::new(RecordingConnection::new());
    let mut ada = Record::new(User {
        team_id: Some(4),
        ..User::new(1, "Ada")
    });

    ada.belongs_to::<Team>(connection.as_ref(), None, None)
        .await
        .unwrap();
    ada.belongs_to::<Team>(connection.as_ref(), Some("team_id"), Some("id"))
        .await
        .unwrap();
    ada.belongs_to::<Team>(connection.as_ref(), Some("team_id"), None)
        .await
        .unwrap();

    // the default foreign key is `team_id` too, so all three share one signature
    assert_eq!(connection.call_count(), 1);
    assert_eq!(ada.relations().len(), 1);
}

#[test]
fn test_has_many_returns_refinable_query() {
    let mut ada = Record::new(User::new(1, "Ada"));

    let mut profiles = ada.has_many::<Profile>(None, None).unwrap();
    profiles.where_eq("bio", "draft");

    let compiled = profiles.compile();
    assert_eq!(
        compiled.sql,
        "SELECT * FROM profiles WHERE (user_id = :p0) AND (bio = :p1)"
    );
    assert_eq!(compiled.parameters.get("p0"), Some(&DatabaseValue::from(1i64)));
}

#[test]
fn test_has_many_skips_trashed_related_rows() {
    let mut core = Record::new(Team {
        id: 4,
        name: "core".to_string(),
    });

    let compiled = core.has_many::<User>(None, None).unwrap().compile();

    assert_eq!(
        compiled.sql,
        "SELECT * FROM users WHERE deleted_at IS NULL AND (team_id = :p0)"
    );
    assert_eq!(compiled.parameters.get("p0"), Some(&DatabaseValue::from(4i64)));
}

#[test]
fn test_has_many_factory_is_memoized() {
    let mut ada = Record::new(User::new(1, "Ada"));

    let first = ada.has_many::<Profile>(None, None).unwrap().compile();
    let second = ada.has_many::<Profile>(None, None).unwrap().compile();

    assert_eq!(first, second);
    assert_eq!(ada.relations().len(), 1);
}

#[test]
fn test_has_many_with_unset_key_matches_nothing() {
    let mut draft = Record::new(User::new(0, "Draft"));

    let compiled = draft.has_many::<Profile>(None, None).unwrap().compile();

    assert_eq!(compiled.sql, "SELECT * FROM profiles WHERE false");
    assert!(compiled.parameters.is_empty());
}

#[test]
fn test_belongs_to_many_from_owner_side() {
    let mut ada = Record::new(User::new(1, "Ada"));

    let compiled = ada.belongs_to_many::<Tag>(&user_tag()).unwrap().compile();

    assert_eq!(
        compiled.sql,
        "SELECT tags.* FROM tags INNER JOIN user_tag ON user_tag.tag_id = tags.id WHERE (user_tag.user_id = :p0)"
    );
}

#[test]
fn test_belongs_to_many_from_related_side() {
    let mut tag = Record::new(Tag {
        id: 3,
        label: "math".to_string(),
    });

    let compiled = tag.belongs_to_many::<User>(&user_tag()).unwrap().compile();

    assert_eq!(
        compiled.sql,
        "SELECT users.* FROM users INNER JOIN user_tag ON user_tag.user_id = users.id WHERE users.deleted_at IS NULL AND (user_tag.tag_id = :p0)"
    );
    assert_eq!(compiled.parameters.get("p0"), Some(&DatabaseValue::from(3i64)));
}

#[test]
fn test_belongs_to_many_rejects_unrelated_pivot() {
    let mut ada = Record::new(User::new(1, "Ada"));

    let err = ada.belongs_to_many::<Team>(&user_tag()).unwrap_err();
    assert!(err.is_validation());
}

#[tokio::test]
async fn test_identity_change_invalidates_cache() {
    let connection = Arc::new(RecordingConnection::new());
    let mut ada = Record::new(User::new(1, "Ada"));

    ada.has_one::<Profile>(connection.as_ref(), None, None)
        .await
        .unwrap();
    ada.entity_mut().id = 2;
    ada.has_one::<Profile>(connection.as_ref(), None, None)
        .await
        .unwrap();

    assert_eq!(connection.call_count(), 2);
    assert_eq!(
        connection.statements()[1].parameters.get("p0"),
        Some(&DatabaseValue::from(2i64))
    );
}

#[tokio::test]
async fn test_insert_with_last_insert_id_refreshes_relationships() {
    let connection = Arc::new(RecordingConnection::new());
    connection.push_result(Cursor::affected(1).with_last_insert_id(42));
    let repo = Repository::<User>::new(connection.clone(), config());
    let mut draft = Record::new(User::new(0, "Ada"));

    let before = draft.has_many::<Profile>(None, None).unwrap().compile();
    assert_eq!(before.sql, "SELECT * FROM profiles WHERE false");
    assert_eq!(draft.relations().len(), 1);

    repo.insert(&mut draft).await.unwrap();
    assert_eq!(draft.id, 42);
    assert!(draft.relations().is_empty());

    let after = draft.has_many::<Profile>(None, None).unwrap().compile();
    assert_eq!(after.parameters.get("p0"), Some(&DatabaseValue::from(42i64)));
}

#[tokio::test]
async fn test_insert_with_returning_refreshes_relationships() {
    let connection = Arc::new(RecordingConnection::with_dialect(SqlDialect::PostgreSQL));
    connection.push_result(Cursor::new(vec![Row::new().with("id", 9i64)]));
    let repo = Repository::<User>::new(connection.clone(), config());
    let mut draft = Record::new(User::new(0, "Ada"));

    let affected = repo.insert(&mut draft).await.unwrap();

    assert_eq!(affected, 1);
    assert_eq!(draft.id, 9);
    assert_eq!(draft.relations().identity(), Some(&DatabaseValue::from(9i64)));
    assert_eq!(
        connection.last_sql().unwrap(),
        "INSERT INTO users (name, email, team_id, kind, deleted_at) VALUES (:p0, :p1, :p2, :p3, :p4) RETURNING id"
    );
}

//! End-to-end checks against a live PostgreSQL server.
//!
//! Set `DATABASE_URL` (or put it in `.env`) to run these; without it every
//! test returns early.

use chrono::{NaiveDate, NaiveDateTime};
use simpledb::{DbConfig, DbError, DbResult, FromRow, IntoParams, SimpleDb, Value};

const CREATE_ARTICLE: &str = r#"CREATE TEMP TABLE article (
    id BIGSERIAL PRIMARY KEY,
    title TEXT NOT NULL UNIQUE,
    "createdDate" TIMESTAMP NOT NULL DEFAULT TIMESTAMP '2024-01-01 00:00:00',
    "isBlind" BOOLEAN NOT NULL DEFAULT FALSE,
    "viewCount" INT
)"#;

#[derive(Debug, Default, PartialEq, FromRow)]
#[orm(rename_all = "camelCase")]
struct Article {
    id: i64,
    title: String,
    created_date: NaiveDateTime,
    is_blind: bool,
    view_count: Option<i32>,
    #[orm(skip)]
    excerpt: String,
}

async fn try_db() -> Option<SimpleDb> {
    dotenvy::dotenv().ok();
    let config = DbConfig::from_env().ok()?;
    Some(SimpleDb::with_config(config))
}

async fn exec(db: &mut SimpleDb, sql: &str, params: impl IntoParams) -> DbResult<u64> {
    let mut stmt = db.gen_sql().await?;
    stmt.append(sql, params);
    stmt.update().await
}

async fn insert_article(db: &mut SimpleDb, title: &str, blind: bool) -> DbResult<i64> {
    let mut stmt = db.gen_sql().await?;
    stmt.append(r#"INSERT INTO article (title, "isBlind")"#, ())
        .append("VALUES (?, ?)", (title, blind));
    stmt.insert().await
}

/// A context with a fresh temporary `article` table on its connection.
async fn seeded_db() -> Option<SimpleDb> {
    let mut db = try_db().await?;
    exec(&mut db, CREATE_ARTICLE, ()).await.unwrap();
    Some(db)
}

fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, min, s)
        .unwrap()
}

#[tokio::test]
async fn insert_returns_increasing_keys() {
    let Some(mut db) = seeded_db().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };

    let first = insert_article(&mut db, "title1", false).await.unwrap();
    let second = insert_article(&mut db, "title2", true).await.unwrap();
    assert!(first > 0);
    assert!(second > first);
}

#[tokio::test]
async fn insert_respects_explicit_returning_and_trailing_semicolon() {
    let Some(mut db) = seeded_db().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };

    let mut stmt = db.gen_sql().await.unwrap();
    stmt.append("INSERT INTO article (title) VALUES (?) RETURNING id", ("a",));
    let a = stmt.insert().await.unwrap();

    let mut stmt = db.gen_sql().await.unwrap();
    stmt.append("INSERT INTO article (title) VALUES (?);", ("b",));
    let b = stmt.insert().await.unwrap();

    let mut stmt = db.gen_sql().await.unwrap();
    stmt.append("INSERT INTO article (title) VALUES (?) RETURNING title", ("c",));
    assert_eq!(stmt.insert().await.unwrap(), 0);

    assert_eq!(b, a + 1);
}

#[tokio::test]
async fn insert_without_generated_column_returns_zero() {
    let Some(mut db) = try_db().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };

    exec(&mut db, "CREATE TEMP TABLE tag (post_id INT, name TEXT)", ())
        .await
        .unwrap();

    let mut stmt = db.gen_sql().await.unwrap();
    stmt.append("INSERT INTO tag (post_id, name) VALUES (?, ?)", (77, "x"));
    assert_eq!(stmt.insert().await.unwrap(), 0);

    let mut stmt = db.gen_sql().await.unwrap();
    stmt.append("SELECT count(*) FROM tag", ());
    assert_eq!(stmt.select_long().await.unwrap(), Some(1));
}

#[tokio::test]
async fn insert_finds_generated_column_anywhere_in_the_row() {
    let Some(mut db) = try_db().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };

    exec(
        &mut db,
        "CREATE TEMP TABLE post (author_id INT, id BIGSERIAL PRIMARY KEY)",
        (),
    )
    .await
    .unwrap();
    exec(
        &mut db,
        "CREATE TEMP TABLE note (body TEXT, id INT GENERATED ALWAYS AS IDENTITY)",
        (),
    )
    .await
    .unwrap();

    let mut stmt = db.gen_sql().await.unwrap();
    stmt.append("INSERT INTO post (author_id) VALUES (?)", (500,));
    assert_eq!(stmt.insert().await.unwrap(), 1);

    let mut stmt = db.gen_sql().await.unwrap();
    stmt.append("INSERT INTO post (author_id) VALUES (?)", (501,));
    assert_eq!(stmt.insert().await.unwrap(), 2);

    let mut stmt = db.gen_sql().await.unwrap();
    stmt.append("INSERT INTO note (body) VALUES (?)", ("hello",));
    assert_eq!(stmt.insert().await.unwrap(), 1);
}

#[tokio::test]
async fn insert_ending_in_a_comment_still_returns_the_key() {
    let Some(mut db) = seeded_db().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };

    let mut stmt = db.gen_sql().await.unwrap();
    stmt.append("INSERT INTO article (title) VALUES (?) -- seed row", ("title1",));
    let first = stmt.insert().await.unwrap();
    assert!(first > 0);

    let mut stmt = db.gen_sql().await.unwrap();
    stmt.append("INSERT INTO article (title) VALUES (?); /* second */", ("title2",));
    assert_eq!(stmt.insert().await.unwrap(), first + 1);
}

#[tokio::test]
async fn update_and_delete_report_affected_rows() {
    let Some(mut db) = seeded_db().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };

    for title in ["t1", "t2", "t3"] {
        insert_article(&mut db, title, false).await.unwrap();
    }

    let mut stmt = db.gen_sql().await.unwrap();
    stmt.append(r#"UPDATE article SET "isBlind" = ?"#, (true,));
    stmt.append_in("WHERE title IN (?)", ["t1", "t2"]).unwrap();
    assert_eq!(stmt.update().await.unwrap(), 2);

    let mut stmt = db.gen_sql().await.unwrap();
    stmt.append("DELETE FROM article WHERE title = ?", ("missing",));
    assert_eq!(stmt.delete().await.unwrap(), 0);

    let mut stmt = db.gen_sql().await.unwrap();
    stmt.append(r#"DELETE FROM article WHERE "isBlind" = ?"#, (true,));
    assert_eq!(stmt.delete().await.unwrap(), 2);
}

#[tokio::test]
async fn select_rows_keeps_order_and_labels() {
    let Some(mut db) = seeded_db().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };

    insert_article(&mut db, "title1", false).await.unwrap();
    insert_article(&mut db, "title2", false).await.unwrap();

    let mut stmt = db.gen_sql().await.unwrap();
    stmt.append("SELECT id, title AS name FROM article", ())
        .append("ORDER BY id DESC", ());
    let rows = stmt.select_rows().await.unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].labels().collect::<Vec<_>>(), ["id", "name"]);
    assert_eq!(rows[0].get("name"), Some(&Value::Text("title2".into())));
    assert_eq!(rows[1].get("name"), Some(&Value::Text("title1".into())));

    let mut stmt = db.gen_sql().await.unwrap();
    stmt.append("SELECT * FROM article", ())
        .append("WHERE title = ?", ("title1",));
    let rows = stmt.select_rows().await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(
        rows[0].labels().collect::<Vec<_>>(),
        ["id", "title", "createdDate", "isBlind", "viewCount"]
    );
}

#[tokio::test]
async fn select_row_is_none_for_empty_result() {
    let Some(mut db) = seeded_db().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };

    let mut stmt = db.gen_sql().await.unwrap();
    stmt.append("SELECT * FROM article WHERE id = ?", (-1,));
    assert!(stmt.select_row().await.unwrap().is_none());
    assert!(stmt.select_rows().await.unwrap().is_empty());
    assert_eq!(stmt.select_long().await.unwrap(), None);
    assert!(stmt.select_row_as::<Article>().await.unwrap().is_none());
}

#[tokio::test]
async fn typed_rows_use_renamed_columns() {
    let Some(mut db) = seeded_db().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };

    let created = at(2024, 3, 9, 10, 30, 0);
    let mut stmt = db.gen_sql().await.unwrap();
    stmt.append(
        r#"INSERT INTO article (title, "createdDate", "viewCount") VALUES (?, ?, ?)"#,
        ("title1", created, 42),
    );
    let id = stmt.insert().await.unwrap();
    insert_article(&mut db, "title2", true).await.unwrap();

    let mut stmt = db.gen_sql().await.unwrap();
    stmt.append("SELECT * FROM article ORDER BY id", ());
    let articles: Vec<Article> = stmt.select_rows_as().await.unwrap();

    assert_eq!(articles.len(), 2);
    assert_eq!(
        articles[0],
        Article {
            id,
            title: "title1".into(),
            created_date: created,
            is_blind: false,
            view_count: Some(42),
            excerpt: String::new(),
        }
    );
    assert!(articles[1].is_blind);
    assert_eq!(articles[1].view_count, None);
}

#[tokio::test]
async fn missing_columns_default_in_typed_rows() {
    let Some(mut db) = seeded_db().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };

    insert_article(&mut db, "title1", true).await.unwrap();

    let mut stmt = db.gen_sql().await.unwrap();
    stmt.append("SELECT title FROM article", ());
    let article = stmt.select_row_as::<Article>().await.unwrap().unwrap();
    assert_eq!(article.title, "title1");
    assert_eq!(article.id, 0);
    assert!(!article.is_blind);
}

#[tokio::test]
async fn scalar_selects_coerce_first_column() {
    let Some(mut db) = seeded_db().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };

    let created = at(2023, 12, 31, 23, 59, 58);
    let mut stmt = db.gen_sql().await.unwrap();
    stmt.append(
        r#"INSERT INTO article (title, "createdDate", "isBlind") VALUES (?, ?, ?)"#,
        ("title1", created, true),
    );
    let id = stmt.insert().await.unwrap();

    let mut stmt = db.gen_sql().await.unwrap();
    stmt.append("SELECT count(*) FROM article", ());
    assert_eq!(stmt.select_long().await.unwrap(), Some(1));

    let mut stmt = db.gen_sql().await.unwrap();
    stmt.append("SELECT title FROM article WHERE id = ?", (id,));
    assert_eq!(stmt.select_string().await.unwrap().as_deref(), Some("title1"));

    let mut stmt = db.gen_sql().await.unwrap();
    stmt.append(r#"SELECT "isBlind" FROM article WHERE id = ?"#, (id,));
    assert_eq!(stmt.select_boolean().await.unwrap(), Some(true));

    let mut stmt = db.gen_sql().await.unwrap();
    stmt.append(r#"SELECT NOT "isBlind" FROM article WHERE id = ?"#, (id,));
    assert_eq!(stmt.select_boolean().await.unwrap(), Some(false));

    let mut stmt = db.gen_sql().await.unwrap();
    stmt.append(r#"SELECT "createdDate" FROM article WHERE id = ?"#, (id,));
    assert_eq!(stmt.select_datetime().await.unwrap(), Some(created));

    // a non-timestamp column is not coerced
    let mut stmt = db.gen_sql().await.unwrap();
    stmt.append("SELECT title FROM article WHERE id = ?", (id,));
    assert_eq!(stmt.select_datetime().await.unwrap(), None);

    let mut stmt = db.gen_sql().await.unwrap();
    stmt.append("SELECT 'maybe'", ());
    assert_eq!(stmt.select_boolean().await.unwrap(), None);

    let mut stmt = db.gen_sql().await.unwrap();
    stmt.append("SELECT 2.75::numeric", ());
    assert_eq!(stmt.select_long().await.unwrap(), Some(2));
}

#[tokio::test]
async fn select_longs_preserves_nulls_and_order() {
    let Some(mut db) = try_db().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };

    let mut stmt = db.gen_sql().await.unwrap();
    stmt.append("SELECT n FROM (VALUES (3), (NULL), (1)) AS t(n)", ());
    assert_eq!(
        stmt.select_longs().await.unwrap(),
        vec![Some(3), None, Some(1)]
    );
}

#[tokio::test]
async fn re_executing_runs_the_same_statement() {
    let Some(mut db) = seeded_db().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };

    insert_article(&mut db, "title1", false).await.unwrap();

    let mut stmt = db.gen_sql().await.unwrap();
    stmt.append("SELECT count(*) FROM article WHERE title <> ?", ("x",));
    let text = stmt.text().to_string();
    let params = stmt.params().to_vec();

    assert_eq!(stmt.select_long().await.unwrap(), Some(1));
    assert_eq!(stmt.select_long().await.unwrap(), Some(1));
    assert_eq!(stmt.text(), text);
    assert_eq!(stmt.params(), params.as_slice());
}

#[tokio::test]
async fn question_marks_inside_literals_are_not_parameters() {
    let Some(mut db) = try_db().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };

    let mut stmt = db.gen_sql().await.unwrap();
    stmt.append("SELECT 'why?' || ?::text", ("!",));
    assert_eq!(stmt.select_string().await.unwrap().as_deref(), Some("why?!"));

    let mut stmt = db.gen_sql().await.unwrap();
    stmt.append(r#"SELECT '{"a":1}'::jsonb ?? 'a'"#, ());
    assert_eq!(stmt.select_boolean().await.unwrap(), Some(true));
}

#[tokio::test]
async fn run_uses_an_independent_connection() {
    let Some(mut db) = seeded_db().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };

    // The temporary table only exists in the cached session.
    let err = db.run("SELECT * FROM article", ()).await.unwrap_err();
    assert_eq!(err.sql_state(), Some("42P01"));

    assert_eq!(db.run("SELECT ? + 1", (1,)).await.unwrap(), 1);
    assert!(db.is_connected());

    insert_article(&mut db, "still here", false).await.unwrap();
}

#[tokio::test]
async fn close_is_idempotent_and_reopens_lazily() {
    let Some(mut db) = seeded_db().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };

    assert!(db.is_connected());
    db.close().await;
    db.close().await;
    assert!(!db.is_connected());

    // New session: the temporary table is gone.
    let err = exec(&mut db, "SELECT * FROM article", ()).await.unwrap_err();
    assert_eq!(err.sql_state(), Some("42P01"));
    assert!(db.is_connected());
}

#[tokio::test]
async fn parameter_count_mismatch_is_execution_error() {
    let Some(mut db) = try_db().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };

    let mut stmt = db.gen_sql().await.unwrap();
    stmt.append("SELECT ?::int8, ?::int8", (1,));
    let err = stmt.select_rows().await.unwrap_err();
    assert!(matches!(err, DbError::Execution(_)));
}

#[tokio::test]
async fn unsupported_or_mismatched_columns_are_mapping_errors() {
    let Some(mut db) = seeded_db().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };

    let mut stmt = db.gen_sql().await.unwrap();
    stmt.append("SELECT INTERVAL '1 day' AS span", ());
    match stmt.select_rows().await.unwrap_err() {
        DbError::Mapping { column, .. } => assert_eq!(column, "span"),
        other => panic!("unexpected error: {other}"),
    }

    insert_article(&mut db, "title1", false).await.unwrap();
    let mut stmt = db.gen_sql().await.unwrap();
    stmt.append("SELECT title AS id FROM article", ());
    let err = stmt.select_rows_as::<Article>().await.unwrap_err();
    assert!(err.is_mapping());
}

#[tokio::test]
async fn duplicate_key_is_unique_violation() {
    let Some(mut db) = seeded_db().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };

    insert_article(&mut db, "title1", false).await.unwrap();
    let err = insert_article(&mut db, "title1", false).await.unwrap_err();
    assert!(err.is_unique_violation());
}

#[tokio::test]
async fn custom_row_mapping() {
    let Some(mut db) = try_db().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };

    let mut stmt = db.gen_sql().await.unwrap();
    stmt.append("SELECT n, n * 2 AS doubled FROM generate_series(1, 3) AS n", ());
    let pairs = stmt
        .select_rows_with(|row| Ok((row.get_as::<i64>("n")?, row.get_as::<i64>("doubled")?)))
        .await
        .unwrap();
    assert_eq!(pairs, vec![(1, 2), (2, 4), (3, 6)]);

    let first = stmt
        .select_row_with(|row| row.get_as::<i32>("doubled"))
        .await
        .unwrap();
    assert_eq!(first, Some(2));
}

//! End-to-end tests against a real SQLite database.

#![cfg(feature = "sqlite")]

use sql_conduit::prelude::*;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

async fn test_db() -> (TempDir, Db) {
    let dir = tempfile::tempdir().unwrap();
    let db = Db::connect_sqlite(dir.path().join("test.sqlite3"))
        .await
        .unwrap();
    db.execute_batch(
        "create table hits (id integer primary key autoincrement, site text, total integer);",
    )
    .await
    .unwrap();
    (dir, db)
}

async fn count(db: &Db) -> i64 {
    let row = db.fetch_one("select count(*) from hits", &[]).await.unwrap();
    row.get_by_index(0).and_then(SqlValue::as_int).unwrap()
}

#[tokio::test]
async fn execute_and_fetch() {
    let (_dir, db) = test_db().await;

    let n = db
        .execute(
            "insert into hits (site, total) values (?, ?)",
            &[Arg::value("a"), Arg::value(10)],
        )
        .await
        .unwrap();
    assert_eq!(n, 1);

    let row = db
        .fetch_one(
            "select site, total from hits where site = :site",
            &[named_args! { "site" => "a" }],
        )
        .await
        .unwrap();
    assert_eq!(row.get("site"), Some(&SqlValue::Text("a".into())));
    assert_eq!(row.get("total"), Some(&SqlValue::Int(10)));

    let missing = db
        .fetch_optional("select * from hits where site = ?", &[Arg::value("zz")])
        .await
        .unwrap();
    assert!(missing.is_none());

    // An empty result still reports its column header.
    let empty = db
        .fetch_all("select site, total from hits where 1 = 0", &[])
        .await
        .unwrap();
    assert!(empty.is_empty());
    assert_eq!(empty.columns(), ["site", "total"]);

    let err = db
        .fetch_one("select * from hits where site = ?", &[Arg::value("zz")])
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::NoRows));
}

#[tokio::test]
async fn insert_id_returns_generated_key() {
    let (_dir, db) = test_db().await;

    let first = db
        .insert_id(
            "id",
            "insert into hits (site, total) values (?, ?)",
            &[Arg::value("a"), Arg::value(1)],
        )
        .await
        .unwrap();
    let second = db
        .insert_id(
            "id",
            "insert into hits (site, total) values (?, ?)",
            &[Arg::value("b"), Arg::value(2)],
        )
        .await
        .unwrap();
    assert_eq!(first, 1);
    assert_eq!(second, 2);

    // Multi-row insert reports the last id.
    let last = db
        .insert_id(
            "id",
            "insert into hits (site, total) values ('c', 3), ('d', 4)",
            &[],
        )
        .await
        .unwrap();
    assert_eq!(last, 4);
}

#[tokio::test]
async fn list_expansion_end_to_end() {
    let (_dir, db) = test_db().await;
    for site in ["a", "b", "c"] {
        db.execute(
            "insert into hits (site, total) values (?, 1)",
            &[Arg::value(site)],
        )
        .await
        .unwrap();
    }

    let rows = db
        .fetch_all(
            "select site from hits where site in (?) order by site",
            &[Arg::value(vec!["a", "c", "x"])],
        )
        .await
        .unwrap();
    let sites: Vec<_> = rows
        .into_rows()
        .into_iter()
        .filter_map(|r| r.get("site").and_then(|v| v.as_text().map(str::to_owned)))
        .collect();
    assert_eq!(sites, ["a", "c"]);
}

#[tokio::test]
async fn conditional_blocks_end_to_end() {
    let (_dir, db) = test_db().await;
    db.execute_batch(
        "insert into hits (site, total) values ('a', 1), ('b', 2);",
    )
    .await
    .unwrap();

    let q = "select site from hits where 1=1 {{:site and site = :site}} order by site";

    let rows = db
        .fetch_all(q, &[named_args! { "site" => "a" }])
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);

    let rows = db
        .fetch_all(q, &[named_args! { "site" => "" }])
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
}

#[tokio::test]
async fn transact_commits_on_ok() {
    let (_dir, db) = test_db().await;

    db.transact(|tx| async move {
        assert!(tx.in_transaction());
        tx.execute(
            "insert into hits (site, total) values (?, ?)",
            &[Arg::value("a"), Arg::value(1)],
        )
        .await?;
        Ok(())
    })
    .await
    .unwrap();

    assert_eq!(count(&db).await, 1);
}

#[tokio::test]
async fn transact_rolls_back_on_err() {
    let (_dir, db) = test_db().await;

    let err = db
        .transact(|tx| async move {
            tx.execute(
                "insert into hits (site, total) values (?, ?)",
                &[Arg::value("a"), Arg::value(1)],
            )
            .await?;
            Err::<(), _>(DbError::Execution("boom".into()))
        })
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Execution(_)));

    assert_eq!(count(&db).await, 0);
}

#[tokio::test]
async fn nested_transact_joins_the_outer_transaction() {
    let (_dir, db) = test_db().await;

    db.transact(|tx| async move {
        tx.execute("insert into hits (site, total) values ('outer', 1)", &[])
            .await?;
        tx.transact(|inner| async move {
            inner
                .execute("insert into hits (site, total) values ('inner', 2)", &[])
                .await?;
            Ok(())
        })
        .await?;
        Ok(())
    })
    .await
    .unwrap();
    assert_eq!(count(&db).await, 2);

    // An error anywhere inside rolls the whole thing back.
    let result = db
        .transact(|tx| async move {
            tx.execute("insert into hits (site, total) values ('outer', 1)", &[])
                .await?;
            tx.transact(|inner| async move {
                inner
                    .execute("insert into hits (site, total) values ('inner', 2)", &[])
                    .await?;
                Err::<(), _>(DbError::Execution("inner boom".into()))
            })
            .await
        })
        .await;
    assert!(result.is_err());
    assert_eq!(count(&db).await, 2);
}

#[tokio::test]
async fn begin_on_a_transaction_joins_it() {
    let (_dir, db) = test_db().await;

    let (tx, state) = db.begin().await.unwrap();
    assert_eq!(state, BeginState::Started);
    assert!(tx.in_transaction());
    assert!(!db.same_handle(&tx));

    let (nested, state) = tx.begin().await.unwrap();
    assert_eq!(state, BeginState::AlreadyStarted);
    assert!(tx.same_handle(&nested));

    nested
        .execute("insert into hits (site, total) values ('x', 1)", &[])
        .await
        .unwrap();
    tx.commit().await.unwrap();
    assert_eq!(count(&db).await, 1);
}

#[tokio::test]
async fn resolved_transaction_rejects_further_use() {
    let (_dir, db) = test_db().await;

    let (tx, _) = db.begin().await.unwrap();
    tx.execute("insert into hits (site, total) values ('x', 1)", &[])
        .await
        .unwrap();
    tx.rollback().await.unwrap();

    let err = tx.commit().await.unwrap_err();
    assert!(matches!(err, DbError::TransactionCompleted));

    let err = tx
        .execute("insert into hits (site, total) values ('y', 2)", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::TransactionCompleted));

    assert_eq!(count(&db).await, 0);
}

#[tokio::test]
async fn cancellation_token_aborts_operations() {
    let (_dir, db) = test_db().await;

    let token = CancellationToken::new();
    let canceled = db.with_cancellation(token.clone());
    assert!(db.same_handle(&canceled));

    token.cancel();
    let err = canceled
        .fetch_all("select * from hits", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Canceled));

    // The original handle is unaffected.
    assert_eq!(count(&db).await, 0);
}

#[tokio::test]
async fn query_files_resolve_through_load() {
    let (_dir, db) = test_db().await;
    let db = db.with_query_files(QueryFiles::from_entries([
        ("all-hits", "select site, total from hits order by site\n"),
        ("all-hits-sqlite", "select site from hits order by site\n"),
        ("by-site", "select total from hits where site = :site\n"),
    ]));

    db.execute_batch("insert into hits (site, total) values ('a', 7);")
        .await
        .unwrap();

    // The engine-specific variant wins over the generic one.
    let rows = db.fetch_all("load:all-hits", &[]).await.unwrap();
    assert_eq!(rows.first().unwrap().columns(), ["site"]);

    let row = db
        .fetch_one("load:by-site", &[named_args! { "site" => "a" }])
        .await
        .unwrap();
    assert_eq!(row.get("total"), Some(&SqlValue::Int(7)));

    let err = db.fetch_all("load:nope", &[]).await.unwrap_err();
    assert!(matches!(err, DbError::QueryNotFound(_)));
}

#[tokio::test]
async fn version_reports_server_version() {
    let (_dir, db) = test_db().await;
    let version = db.version().await.unwrap();
    assert!(version.at_least("3.0"));
    db.ping().await.unwrap();
}

//! Query-preparation behavior across binding styles and engines.

use sql_conduit::prelude::*;

fn pg() -> &'static DriverCaps {
    DatabaseType::Postgres.caps()
}

fn lite() -> &'static DriverCaps {
    DatabaseType::Sqlite.caps()
}

#[test]
fn named_placeholders_substitute_in_order() {
    let (sql, args) = prepare_query(
        pg(),
        "select * from t where a = :a and b = :b",
        &[named_args! { "a" => "x", "b" => 2 }],
    )
    .unwrap();
    assert_eq!(sql, "select * from t where a = $1 and b = $2");
    assert_eq!(args, vec![SqlValue::Text("x".into()), SqlValue::Int(2)]);
}

#[test]
fn named_lookup_is_case_insensitive() {
    let (sql, args) = prepare_query(
        pg(),
        "select :Name",
        &[named_args! { "name" => "v" }],
    )
    .unwrap();
    assert_eq!(sql, "select $1");
    assert_eq!(args, vec![SqlValue::Text("v".into())]);
}

#[test]
fn repeated_named_placeholder_binds_twice() {
    let (sql, args) = prepare_query(
        pg(),
        "select :x, :x",
        &[named_args! { "x" => 1 }],
    )
    .unwrap();
    assert_eq!(sql, "select $1, $2");
    assert_eq!(args, vec![SqlValue::Int(1), SqlValue::Int(1)]);
}

#[test]
fn unknown_named_parameter_errors() {
    let err = prepare_query(pg(), "select :x", &[named_args! { "y" => 1 }]).unwrap_err();
    assert!(matches!(err, DbError::UnknownParameter(name) if name == "x"));
}

#[test]
fn positional_rebinds_to_engine_syntax() {
    let (sql, args) = prepare_query(
        pg(),
        "select * from t where a = ? and b = ?",
        &[Arg::value("x"), Arg::value(2)],
    )
    .unwrap();
    assert_eq!(sql, "select * from t where a = $1 and b = $2");
    assert_eq!(args, vec![SqlValue::Text("x".into()), SqlValue::Int(2)]);
}

#[test]
fn native_syntax_passes_through_unchanged() {
    let (sql, args) = prepare_query(
        pg(),
        "select * from t where a = $1",
        &[Arg::value("x")],
    )
    .unwrap();
    assert_eq!(sql, "select * from t where a = $1");
    assert_eq!(args.len(), 1);

    let (sql, _) = prepare_query(lite(), "select ?", &[Arg::value(1)]).unwrap();
    assert_eq!(sql, "select ?");
}

#[test]
fn quoted_text_and_casts_are_opaque() {
    let (sql, args) = prepare_query(
        pg(),
        "select ':nope', x::text, \":also\" from t where a = :a -- :no\n",
        &[named_args! { "a" => 1 }],
    )
    .unwrap();
    assert_eq!(
        sql,
        "select ':nope', x::text, \":also\" from t where a = $1 -- :no\n"
    );
    assert_eq!(args, vec![SqlValue::Int(1)]);
}

#[test]
fn template_mixing_styles_errors() {
    let err = prepare_query(
        pg(),
        "select :x = ?",
        &[Arg::value(1)],
    )
    .unwrap_err();
    assert!(matches!(err, DbError::MixedPlaceholders));

    let err = prepare_query(
        pg(),
        "select :x = ?",
        &[named_args! { "x" => 1 }],
    )
    .unwrap_err();
    assert!(matches!(err, DbError::MixedPlaceholders));
}

#[test]
fn conditional_block_included_when_truthy() {
    let (sql, args) = prepare_query(
        pg(),
        "select * from t where 1=1 {{:x and x = :x}}",
        &[named_args! { "x" => "v" }],
    )
    .unwrap();
    assert_eq!(sql, "select * from t where 1=1 and x = $1");
    assert_eq!(args, vec![SqlValue::Text("v".into())]);
}

#[test]
fn conditional_block_dropped_when_falsy() {
    let (sql, args) = prepare_query(
        pg(),
        "select * from t where 1=1 {{:x and x = :x}}",
        &[named_args! { "x" => "" }],
    )
    .unwrap();
    assert_eq!(sql, "select * from t where 1=1 ");
    assert!(args.is_empty());
}

#[test]
fn negated_conditional_inverts() {
    let template = "select * from t where 1=1 {{:x! and x is null}}";
    let (sql, _) = prepare_query(pg(), template, &[named_args! { "x" => "" }]).unwrap();
    assert_eq!(sql, "select * from t where 1=1 and x is null");

    let (sql, _) = prepare_query(pg(), template, &[named_args! { "x" => "v" }]).unwrap();
    assert_eq!(sql, "select * from t where 1=1 ");
}

#[test]
fn record_fields_drive_conditional_blocks() {
    struct HitFilter {
        site: String,
        include_bots: bool,
    }

    impl BindRecord for HitFilter {
        fn bind_fields(&self) -> Vec<(String, SqlValue)> {
            vec![
                ("site".into(), SqlValue::Text(self.site.clone())),
                ("include_bots".into(), SqlValue::Bool(self.include_bots)),
            ]
        }
    }

    let q = "select * from hits where 1=1 {{:site and site = :site}} {{:include_bots! and bot = 0}}";

    let filter = HitFilter {
        site: "a".into(),
        include_bots: false,
    };
    let (sql, args) = prepare_query(pg(), q, &[Arg::record(&filter)]).unwrap();
    assert_eq!(sql, "select * from hits where 1=1 and site = $1 and bot = 0");
    assert_eq!(args, vec![SqlValue::Text("a".into())]);

    let filter = HitFilter {
        site: String::new(),
        include_bots: true,
    };
    let (sql, args) = prepare_query(pg(), q, &[Arg::record(&filter)]).unwrap();
    assert_eq!(sql, "select * from hits where 1=1  ");
    assert!(args.is_empty());
}

#[test]
fn missing_block_controller_errors() {
    let err = prepare_query(pg(), "select {{:x y}}", &[named_args! { "y" => 1 }]).unwrap_err();
    assert!(matches!(err, DbError::UnknownParameter(name) if name == "x"));
}

#[test]
fn malformed_blocks_stay_verbatim() {
    for template in [
        "select {{bad}} from t",
        "select {{:}} from t",
        "select {{:x_no_sep}} from t",
        "select {{:open never closed",
    ] {
        let (sql, args) = prepare_query(pg(), template, &[]).unwrap();
        assert_eq!(sql, template);
        assert!(args.is_empty());
    }
}

#[test]
fn conditional_with_positional_args_passes_through() {
    // Blocks are a named-mode feature; positional calls leave them alone
    // and forward the arguments untouched.
    let (sql, args) = prepare_query(
        pg(),
        "select {{:x cond}}",
        &[Arg::value("z"), Arg::value(1)],
    )
    .unwrap();
    assert_eq!(sql, "select {{:x cond}}");
    assert_eq!(args, vec![SqlValue::Text("z".into()), SqlValue::Int(1)]);
}

#[test]
fn list_expands_in_place() {
    let (sql, args) = prepare_query(
        pg(),
        "select * from t where id in (?)",
        &[Arg::value(vec![1i64, 2, 3])],
    )
    .unwrap();
    assert_eq!(sql, "select * from t where id in ($1, $2, $3)");
    assert_eq!(
        args,
        vec![SqlValue::Int(1), SqlValue::Int(2), SqlValue::Int(3)]
    );

    let (sql, _) = prepare_query(
        lite(),
        "select * from t where id in (?)",
        &[Arg::value(vec!["a", "b"])],
    )
    .unwrap();
    assert_eq!(sql, "select * from t where id in (?, ?)");
}

#[test]
fn list_and_scalars_interleave() {
    let (sql, args) = prepare_query(
        pg(),
        "select * from t where a = ? and id in (?) and b = ?",
        &[
            Arg::value("x"),
            Arg::value(vec![1i64, 2]),
            Arg::value(9),
        ],
    )
    .unwrap();
    assert_eq!(
        sql,
        "select * from t where a = $1 and id in ($2, $3) and b = $4"
    );
    assert_eq!(args.len(), 4);
}

#[test]
fn named_list_expands_too() {
    let (sql, args) = prepare_query(
        pg(),
        "select * from t where id in (:ids)",
        &[named_args! { "ids" => vec![4i64, 5] }],
    )
    .unwrap();
    assert_eq!(sql, "select * from t where id in ($1, $2)");
    assert_eq!(args, vec![SqlValue::Int(4), SqlValue::Int(5)]);
}

#[test]
fn empty_list_errors() {
    let err = prepare_query(
        pg(),
        "select * from t where id in (?)",
        &[Arg::value(Vec::<i64>::new())],
    )
    .unwrap_err();
    assert!(matches!(err, DbError::Execution(_)));
}

#[test]
fn expansion_requires_matching_counts() {
    let err = prepare_query(
        pg(),
        "select * from t where id in (?) and a = ?",
        &[Arg::value(vec![1i64])],
    )
    .unwrap_err();
    assert!(matches!(err, DbError::Execution(_)));
}

#[test]
fn dollar_quoted_bodies_are_opaque() {
    let (sql, args) = prepare_query(
        pg(),
        "create function f() returns int as $fn$ select :x $fn$ language sql",
        &[],
    )
    .unwrap();
    assert_eq!(
        sql,
        "create function f() returns int as $fn$ select :x $fn$ language sql"
    );
    assert!(args.is_empty());
}

#[test]
fn backslash_escaped_literals_follow_the_engine() {
    let template = r"select 'it\'s', :x";

    // MariaDB lexes `\'` as an escaped quote, so `:x` sits in plain text.
    let (sql, args) = prepare_query(
        DatabaseType::MariaDb.caps(),
        template,
        &[named_args! { "x" => 1 }],
    )
    .unwrap();
    assert_eq!(sql, r"select 'it\'s', ?");
    assert_eq!(args, vec![SqlValue::Int(1)]);

    // Standard lexing: the second quote reopens a literal that swallows
    // the rest, so nothing substitutes.
    let (sql, args) = prepare_query(pg(), template, &[named_args! { "x" => 1 }]).unwrap();
    assert_eq!(sql, template);
    assert!(args.is_empty());
}

#[test]
fn conflicting_sources_are_rejected() {
    let err = prepare_query(
        pg(),
        "select :x",
        &[named_args! { "x" => 1 }, Arg::value(2)],
    )
    .unwrap_err();
    assert!(matches!(err, DbError::MixedParameters));

    let err = prepare_query(
        pg(),
        "select :x",
        &[named_args! { "x" => 1 }, named_args! { "x" => 2 }],
    )
    .unwrap_err();
    assert!(matches!(err, DbError::DuplicateParameter(key) if key == "x"));
}

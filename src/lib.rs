use pgrx::prelude::*;
use pgrx::JsonB;

mod args;
mod change;
mod executor;
mod guard;
mod plan_cache;
mod row;
mod trigger;
pub mod config;
pub mod error;
pub mod validation;

pub use error::{CascadeError, CascadeResult};

pg_module_magic!();

/// Get the version of the pg_cascade_touch extension
#[pg_extern]
fn pg_cascade_touch_version() -> &'static str {
    "0.1.0"
}

/// Inspect the backend's cascade plan cache as JSONB
///
/// Reports entry count, how many entries hold a prepared statement, and the
/// identity keys. Plans are cached for the life of the backend and never
/// invalidated, so this is the place to look when a cached statement has
/// outlived a schema change.
#[pg_extern]
fn pg_cascade_touch_plans() -> JsonB {
    match serde_json::to_value(plan_cache::stats()) {
        Ok(value) => JsonB(value),
        Err(e) => {
            error!("Failed to serialize plan cache statistics: {}", e);
        }
    }
}

#[cfg(any(test, feature = "pg_test"))]
#[pg_schema]
mod tests {
    use pgrx::prelude::*;
    use pgrx::JsonB;

    fn install_tables() {
        Spi::run(
            "CREATE TABLE topic (
                id BIGINT PRIMARY KEY,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT '2000-01-01'
            )",
        )
        .unwrap();
        Spi::run(
            "CREATE TABLE post (
                id BIGINT PRIMARY KEY,
                topic_id BIGINT,
                content TEXT,
                is_deleted BOOLEAN NOT NULL DEFAULT false
            )",
        )
        .unwrap();
        Spi::run("INSERT INTO topic (id) VALUES (5)").unwrap();
    }

    fn install_trigger(body: &str) {
        Spi::run(&format!(
            "CREATE TRIGGER post_touch AFTER INSERT OR UPDATE OR DELETE ON post
             FOR EACH ROW EXECUTE PROCEDURE {}",
            body
        ))
        .unwrap();
    }

    /// NOW() is fixed for the whole test transaction, so a touched row's
    /// timestamp equals it exactly and the seeded default never does.
    fn touched(topic_id: i64) -> bool {
        Spi::get_one::<bool>(&format!(
            "SELECT updated_at = NOW() FROM topic WHERE id = {topic_id}"
        ))
        .unwrap()
        .unwrap()
    }

    fn reset_topic(topic_id: i64) {
        Spi::run(&format!("UPDATE topic SET updated_at = '2000-01-01' WHERE id = {topic_id}"))
            .unwrap();
    }

    fn cached_plan_count() -> u64 {
        let JsonB(stats) = Spi::get_one::<JsonB>("SELECT pg_cascade_touch_plans()")
            .unwrap()
            .expect("stats function returned NULL");
        stats["entries"].as_u64().unwrap()
    }

    #[pg_test]
    fn test_version_callable_from_sql() {
        let version = Spi::get_one::<String>("SELECT pg_cascade_touch_version()").unwrap();
        assert_eq!(version.as_deref(), Some("0.1.0"));
    }

    #[pg_test]
    fn test_insert_touches_parent() {
        install_tables();
        install_trigger("cascade_timestamp('topic', 'updated_at', 'id', 'topic_id')");

        assert!(!touched(5));
        Spi::run("INSERT INTO post (id, topic_id) VALUES (1, 5)").unwrap();
        assert!(touched(5));
    }

    #[pg_test]
    fn test_simplified_variant_touches_parent() {
        install_tables();
        install_trigger("cascade_touch('topic', 'updated_at', 'topic_id')");

        Spi::run("INSERT INTO post (id, topic_id) VALUES (1, 5)").unwrap();
        assert!(touched(5));
    }

    #[pg_test]
    fn test_null_source_key_skips_silently() {
        install_tables();
        install_trigger("cascade_timestamp('topic', 'updated_at', 'id', 'topic_id')");

        Spi::run("INSERT INTO post (id, topic_id) VALUES (1, NULL)").unwrap();
        assert!(!touched(5));
    }

    #[pg_test]
    fn test_rewrite_without_changes_does_not_cascade() {
        install_tables();
        install_trigger("cascade_timestamp('topic', 'updated_at', 'id', 'topic_id')");

        Spi::run("INSERT INTO post (id, topic_id, content) VALUES (1, 5, 'hello')").unwrap();
        reset_topic(5);

        // the kind of UPDATE an ORM issues on save without edits
        Spi::run("UPDATE post SET content = content, topic_id = topic_id WHERE id = 1").unwrap();
        assert!(!touched(5));

        // idempotence: any number of identical rewrites stays quiet
        Spi::run("UPDATE post SET content = content WHERE id = 1").unwrap();
        Spi::run("UPDATE post SET content = content WHERE id = 1").unwrap();
        assert!(!touched(5));
    }

    #[pg_test]
    fn test_content_change_cascades() {
        install_tables();
        install_trigger("cascade_timestamp('topic', 'updated_at', 'id', 'topic_id')");

        Spi::run("INSERT INTO post (id, topic_id, content) VALUES (1, 5, 'hello')").unwrap();
        reset_topic(5);

        Spi::run("UPDATE post SET content = 'edited' WHERE id = 1").unwrap();
        assert!(touched(5));
    }

    #[pg_test]
    fn test_null_transitions_count_as_changes() {
        install_tables();
        install_trigger("cascade_timestamp('topic', 'updated_at', 'id', 'topic_id')");

        Spi::run("INSERT INTO post (id, topic_id, content) VALUES (1, 5, NULL)").unwrap();
        reset_topic(5);

        Spi::run("UPDATE post SET content = 'was null' WHERE id = 1").unwrap();
        assert!(touched(5));
    }

    #[pg_test]
    fn test_delete_cascades() {
        install_tables();
        install_trigger("cascade_timestamp('topic', 'updated_at', 'id', 'topic_id')");

        Spi::run("INSERT INTO post (id, topic_id) VALUES (1, 5)").unwrap();
        reset_topic(5);

        Spi::run("DELETE FROM post WHERE id = 1").unwrap();
        assert!(touched(5));
    }

    #[pg_test]
    fn test_guard_vetoes_cascade() {
        install_tables();
        install_trigger(
            "cascade_timestamp('topic', 'updated_at', 'id', 'topic_id', 'is_deleted', 'f')",
        );

        Spi::run("INSERT INTO post (id, topic_id, is_deleted) VALUES (1, 5, true)").unwrap();
        assert!(!touched(5));

        Spi::run("UPDATE post SET content = 'still deleted' WHERE id = 1").unwrap();
        assert!(!touched(5));
    }

    #[pg_test]
    fn test_guard_passes_on_match() {
        install_tables();
        install_trigger(
            "cascade_timestamp('topic', 'updated_at', 'id', 'topic_id', 'is_deleted', 'f')",
        );

        Spi::run("INSERT INTO post (id, topic_id, is_deleted) VALUES (1, 5, false)").unwrap();
        assert!(touched(5));
    }

    #[pg_test]
    fn test_null_predicate_value_does_not_veto() {
        install_tables();
        install_trigger(
            "cascade_timestamp('topic', 'updated_at', 'id', 'topic_id', 'content', 'anything')",
        );

        Spi::run("INSERT INTO post (id, topic_id, content) VALUES (1, 5, NULL)").unwrap();
        assert!(touched(5));
    }

    #[pg_test]
    fn test_plan_is_cached_per_trigger_relation_pair() {
        install_tables();
        install_trigger("cascade_timestamp('topic', 'updated_at', 'id', 'topic_id')");

        let before = cached_plan_count();
        Spi::run("INSERT INTO post (id, topic_id) VALUES (1, 5)").unwrap();
        Spi::run("INSERT INTO post (id, topic_id) VALUES (2, 5)").unwrap();

        // two firings of one (trigger, relation) pair share one entry
        assert_eq!(cached_plan_count(), before + 1);
    }

    #[pg_test(error = "\"post\" has no attribute \"missing_col\"")]
    fn test_unknown_predicate_column_is_fatal() {
        install_tables();
        install_trigger(
            "cascade_timestamp('topic', 'updated_at', 'id', 'topic_id', 'missing_col', 'x')",
        );

        Spi::run("INSERT INTO post (id, topic_id) VALUES (1, 5)").unwrap();
    }

    #[pg_test(error = "expected at least 4 trigger arguments (destination table, \
                       timestamp column, key columns), got 2")]
    fn test_explicit_variant_requires_four_arguments() {
        install_tables();
        install_trigger("cascade_timestamp('topic', 'updated_at')");

        Spi::run("INSERT INTO post (id, topic_id) VALUES (1, 5)").unwrap();
    }

    #[pg_test(error = "predicate guards must be supplied as column/value pairs, \
                       got 1 trailing arguments")]
    fn test_unpaired_guard_arguments_are_fatal() {
        install_tables();
        install_trigger("cascade_timestamp('topic', 'updated_at', 'id', 'topic_id', 'is_deleted')");

        Spi::run("INSERT INTO post (id, topic_id) VALUES (1, 5)").unwrap();
    }

    #[pg_test(error = "cascade trigger must fire AFTER the event, fired BEFORE")]
    fn test_before_trigger_rejected() {
        install_tables();
        Spi::run(
            "CREATE TRIGGER post_touch BEFORE INSERT ON post
             FOR EACH ROW EXECUTE PROCEDURE
             cascade_timestamp('topic', 'updated_at', 'id', 'topic_id')",
        )
        .unwrap();

        Spi::run("INSERT INTO post (id, topic_id) VALUES (1, 5)").unwrap();
    }
}

#[cfg(test)]
pub mod pg_test {
    pub fn setup(_options: Vec<&str>) {
        // noop
    }

    #[must_use]
    pub fn postgresql_conf_options() -> Vec<&'static str> {
        vec![]
    }
}

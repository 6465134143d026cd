//! Integration tests for the live query engine against the in-memory store.

mod common;

use common::*;
use std::time::Duration;
use vigil_core::{
    ClassRef, DocumentStore, DocumentUpdate, Error, Filter, FindOptions, LookupSpec, SortOrder, SpaceRef, Tx, Value,
    WorkspaceEvent,
};
use vigil_reactive::LiveQueryConfig;

fn by_name(limit: usize) -> FindOptions {
    FindOptions::new().with_sort("name", SortOrder::Ascending).with_limit(limit)
}

fn is_sorted(names: &[String]) -> bool {
    names.windows(2).all(|w| w[0] <= w[1])
}

#[tokio::test]
async fn test_sorted_limited_query_follows_rename() {
    let fx = Fixture::new();
    let ids = fx.create_spaces(5).await;
    let rec = Recorder::new();
    let _handle = fx.engine.query(SPACE, Filter::new(), by_name(3), rec.callback()).unwrap();
    fx.engine.flush().await;

    let initial = rec.last();
    assert!(initial.result.len() <= 3);
    assert_eq!(names(&initial.result), vec!["space-00", "space-01", "space-02"]);

    let rename = fx.factory.update_doc(
        SPACE,
        MODEL_SPACE,
        &ids[4],
        DocumentUpdate::new().set("name", "space-00-updated"),
    );
    fx.commit(vec![rename]).await;

    let last = rec.last();
    assert!(last.result.len() <= 3);
    assert_eq!(names(&last.result), vec!["space-00", "space-00-updated", "space-01"]);
}

#[tokio::test]
async fn test_update_out_of_filter_removes_document() {
    let fx = Fixture::new();
    let id = fx.create_space("only").await;
    let rec = Recorder::new();
    let _handle = fx
        .engine
        .query(SPACE, Filter::new().eq("private", false), FindOptions::new(), rec.callback())
        .unwrap();
    fx.engine.flush().await;
    assert_eq!(rec.last().result.len(), 1);

    let calls = fx.store.find_all_calls();
    let update = fx
        .factory
        .update_doc(SPACE, MODEL_SPACE, &id, DocumentUpdate::new().set("private", true));
    fx.commit(vec![update]).await;

    assert_eq!(rec.count(), 2);
    let last = rec.last();
    assert!(last.result.is_empty());
    assert_eq!(last.removed, vec![id]);
    // Patched locally
    assert_eq!(fx.store.find_all_calls(), calls);
}

#[tokio::test]
async fn test_same_millisecond_update_reaches_overlapping_queries() {
    for public_first in [true, false] {
        let fx = Fixture::new();
        let create = fx.factory.create_doc(
            SPACE,
            MODEL_SPACE,
            [("name", Value::from("x")), ("private", Value::from(true))],
        );
        let id = create.object_id().cloned().unwrap();
        fx.commit(vec![create]).await;
        let stamped = fx.store.get(&id).unwrap().modified_on;

        let public = Recorder::new();
        let all = Recorder::new();
        let subscribe_public = || {
            fx.engine
                .query(SPACE, Filter::new().eq("private", false), FindOptions::new(), public.callback())
                .unwrap()
        };
        let subscribe_all = || fx.engine.query(SPACE, Filter::new(), FindOptions::new(), all.callback()).unwrap();
        let _handles = if public_first {
            (subscribe_public(), subscribe_all())
        } else {
            let all_handle = subscribe_all();
            (subscribe_public(), all_handle)
        };
        fx.engine.flush().await;
        assert!(public.last().result.is_empty());

        // Another client writes within the same millisecond
        let update = Tx::UpdateDoc {
            id: id.clone(),
            class: ClassRef::from(SPACE),
            space: SpaceRef::from(MODEL_SPACE),
            operations: DocumentUpdate::new().set("private", false),
            modified_on: stamped,
            attached_to: None,
        };
        fx.commit(vec![update]).await;
        fx.engine.flush().await;

        let stored = fx
            .store
            .find_all(&ClassRef::from(SPACE), &Filter::new().eq("private", false), &FindOptions::new())
            .await
            .unwrap();
        assert_eq!(stored.docs.len(), 1);
        let live = public.last();
        assert_eq!(live.result.len(), 1, "public_first={}", public_first);
        assert_eq!(live.result[0].id, id);
        assert_eq!(all.last().result[0].get("private").as_deref(), Some(&Value::from(false)));
    }
}

#[tokio::test]
async fn test_reverse_lookup_gains_new_comment() {
    let fx = Fixture::new();
    let parent = fx.create_space("parent").await;
    let rec = Recorder::new();
    let _handle = fx
        .engine
        .query(
            SPACE,
            Filter::by_id(parent.clone()),
            FindOptions::new().with_lookup(LookupSpec::new().reverse("comments", COMMENT)),
            rec.callback(),
        )
        .unwrap();
    fx.engine.flush().await;
    let before = rec.count();
    let comments = rec.last().result[0].lookup["comments"].as_many().map(<[_]>::len);
    assert_eq!(comments, Some(0));

    let comment = fx
        .factory
        .add_collection(COMMENT, MODEL_SPACE, &parent, SPACE, "comments", [("message", "hello")]);
    let comment_id = comment.object_id().cloned().unwrap();
    fx.commit(vec![comment]).await;

    assert!(rec.count() > before);
    let last = rec.last();
    let members = last.result[0].lookup["comments"].as_many().unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].id, comment_id);
}

#[tokio::test]
async fn test_find_one_projection_keeps_header_fields() {
    let fx = Fixture::new();
    let id = fx.create_space("projected").await;

    let doc = fx
        .engine
        .find_one(SPACE, Filter::by_id(id.clone()), FindOptions::new().with_projection(["name"]))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(doc.get("name").unwrap().as_str(), Some("projected"));
    assert!(doc.get("_class").is_some());
    assert!(doc.get("space").is_some());
    assert!(doc.get("modifiedOn").is_some());
    assert_eq!(doc.id, id);
    assert!(doc.get("private").is_none());
}

#[tokio::test]
async fn test_find_all_reports_total_beyond_limit() {
    let fx = Fixture::new();
    fx.create_spaces(10).await;

    let found = fx
        .engine
        .find_all(SPACE, Filter::new(), FindOptions::new().with_limit(5).with_total())
        .await
        .unwrap();

    assert_eq!(found.docs.len(), 5);
    assert!(found.total.unwrap() >= 10);
}

#[tokio::test]
async fn test_limit_and_sort_hold_across_inserts() {
    let fx = Fixture::new();
    let rec = Recorder::new();
    let _handle = fx.engine.query(SPACE, Filter::new(), by_name(3), rec.callback()).unwrap();
    fx.engine.flush().await;

    for name in ["m", "a", "z", "b", "c", "y"] {
        fx.create_space(name).await;
    }

    for changes in rec.all() {
        assert!(changes.result.len() <= 3);
        assert!(is_sorted(&names(&changes.result)));
    }
    assert_eq!(names(&rec.last().result), vec!["a", "b", "c"]);
}

#[tokio::test]
async fn test_identical_queries_share_one_fetch() {
    let fx = Fixture::new();
    fx.create_spaces(3).await;
    let first = Recorder::new();
    let second = Recorder::new();

    let _a = fx
        .engine
        .query(SPACE, Filter::new().eq("private", false).eq("archived", false), by_name(2), first.callback())
        .unwrap();
    let _b = fx
        .engine
        .query(SPACE, Filter::new().eq("archived", false).eq("private", false), by_name(2), second.callback())
        .unwrap();
    fx.engine.flush().await;

    assert_eq!(fx.store.find_all_calls(), 1);
    assert_eq!(fx.engine.active_count(), 1);
    assert_eq!(first.count(), 1);
    assert_eq!(second.count(), 1);
    assert_eq!(first.last().result, second.last().result);
}

#[tokio::test]
async fn test_different_options_are_different_queries() {
    let fx = Fixture::new();
    fx.create_spaces(3).await;
    let _a = fx.engine.query(SPACE, Filter::new(), by_name(2), |_| {}).unwrap();
    let _b = fx.engine.query(SPACE, Filter::new(), by_name(3), |_| {}).unwrap();
    fx.engine.flush().await;

    assert_eq!(fx.store.find_all_calls(), 2);
    assert_eq!(fx.engine.active_count(), 2);
}

#[tokio::test]
async fn test_second_subscriber_receives_cached_result_synchronously() {
    let fx = Fixture::new();
    fx.create_spaces(2).await;
    let _a = fx.engine.query(SPACE, Filter::new(), FindOptions::new(), |_| {}).unwrap();
    fx.engine.flush().await;

    let rec = Recorder::new();
    let _b = fx.engine.query(SPACE, Filter::new(), FindOptions::new(), rec.callback()).unwrap();
    assert_eq!(rec.count(), 1);
    assert_eq!(rec.last().added.len(), 2);
}

#[tokio::test]
async fn test_queued_query_answers_find_one() {
    let fx = Fixture::new();
    fx.create_spaces(2).await;
    let filter = Filter::new().eq("private", false);
    let handle = fx
        .engine
        .query(SPACE, filter.clone(), by_name(1), |_| {})
        .unwrap();
    fx.engine.flush().await;

    handle.unsubscribe();
    handle.unsubscribe();
    assert_eq!(fx.engine.active_count(), 0);
    assert_eq!(fx.engine.queued_count(), 1);

    let calls = fx.store.find_all_calls();
    let doc = fx
        .engine
        .find_one(SPACE, filter, FindOptions::new().with_sort("name", SortOrder::Ascending))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(doc.get("name").unwrap().as_str(), Some("space-00"));
    assert_eq!(fx.store.find_all_calls(), calls);
}

#[tokio::test]
async fn test_find_one_returns_isolated_copies() {
    let fx = Fixture::new();
    let id = fx.create_space("original").await;

    let mut doc = fx
        .engine
        .find_one(SPACE, Filter::by_id(id.clone()), FindOptions::new())
        .await
        .unwrap()
        .unwrap();
    doc.set("name", Value::from("mutated"));

    let again = fx
        .engine
        .find_one(SPACE, Filter::by_id(id), FindOptions::new())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(again.get("name").unwrap().as_str(), Some("original"));
    assert_eq!(fx.store.find_all_calls(), 1);
}

#[tokio::test]
async fn test_find_one_uses_reference_cache() {
    let fx = Fixture::new();
    let ids = fx.create_spaces(3).await;
    let _handle = fx.engine.query(SPACE, Filter::new(), FindOptions::new(), |_| {}).unwrap();
    fx.engine.flush().await;
    let calls = fx.store.find_all_calls();

    let doc = fx
        .engine
        .find_one(SPACE, Filter::by_id(ids[1].clone()), FindOptions::new())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(doc.id, ids[1]);
    assert_eq!(fx.store.find_all_calls(), calls);
    assert_eq!(fx.engine.queued_count(), 0);
}

#[tokio::test]
async fn test_find_one_missing_document() {
    let fx = Fixture::new();
    fx.create_spaces(1).await;
    let found = fx
        .engine
        .find_one(SPACE, Filter::by_id("missing"), FindOptions::new())
        .await
        .unwrap();
    assert!(found.is_none());
}

#[tokio::test]
async fn test_unknown_class_is_rejected() {
    let fx = Fixture::new();
    let result = fx.engine.query("test:class:Unknown", Filter::new(), FindOptions::new(), |_| {});
    assert!(matches!(result, Err(Error::ClassNotFound { .. })));
    let result = fx.engine.find_all("test:class:Unknown", Filter::new(), FindOptions::new()).await;
    assert!(matches!(result, Err(Error::ClassNotFound { .. })));
}

#[tokio::test]
async fn test_security_change_refreshes_unprovable_queries() {
    let fx = Fixture::new();
    let _in = fx
        .engine
        .query(SPACE, Filter::new().is_in("space", ["a", "b"]), FindOptions::new(), |_| {})
        .unwrap();
    let _literal_a = fx
        .engine
        .query(SPACE, Filter::new().eq("space", "a"), FindOptions::new(), |_| {})
        .unwrap();
    let _literal_c = fx
        .engine
        .query(SPACE, Filter::new().eq("space", "c"), FindOptions::new(), |_| {})
        .unwrap();
    let _unscoped = fx.engine.query(SPACE, Filter::new(), FindOptions::new(), |_| {}).unwrap();
    fx.engine.flush().await;
    let calls = fx.store.find_all_calls();

    fx.engine
        .handle_workspace_event(WorkspaceEvent::SecurityChange {
            space: SpaceRef::from("a"),
        })
        .await;

    // `$in`, literal `a` and the unscoped query; literal `c` is provably unaffected
    assert_eq!(fx.store.find_all_calls(), calls + 3);
}

#[tokio::test]
async fn test_indexing_and_bulk_events() {
    let fx = Fixture::new();
    let _search = fx
        .engine
        .query(SPACE, Filter::new().search("space"), FindOptions::new(), |_| {})
        .unwrap();
    let _plain = fx.engine.query(SPACE, Filter::new(), FindOptions::new(), |_| {}).unwrap();
    fx.engine.flush().await;

    let calls = fx.store.find_all_calls();
    fx.engine
        .handle_workspace_event(WorkspaceEvent::IndexingUpdate {
            classes: vec![ClassRef::from(SPACE)],
        })
        .await;
    assert_eq!(fx.store.find_all_calls(), calls + 1);

    fx.engine
        .handle_workspace_event(WorkspaceEvent::BulkUpdate {
            classes: vec![ClassRef::from(SPACE)],
        })
        .await;
    assert_eq!(fx.store.find_all_calls(), calls + 3);

    fx.engine
        .handle_workspace_event(WorkspaceEvent::BulkUpdate {
            classes: vec![ClassRef::from(COMMENT)],
        })
        .await;
    assert_eq!(fx.store.find_all_calls(), calls + 3);
}

#[tokio::test]
async fn test_search_query_refreshes_on_change() {
    let fx = Fixture::new();
    let rec = Recorder::new();
    let _handle = fx
        .engine
        .query(SPACE, Filter::new().search("alpha"), FindOptions::new(), rec.callback())
        .unwrap();
    fx.engine.flush().await;
    assert!(rec.last().result.is_empty());

    fx.create_space("alpha one").await;
    assert_eq!(names(&rec.last().result), vec!["alpha one"]);
}

#[tokio::test]
async fn test_clean_reconnect_delivers_empty_then_refreshes() {
    let fx = Fixture::new();
    fx.create_spaces(3).await;
    let rec = Recorder::new();
    let _active = fx.engine.query(SPACE, Filter::new(), FindOptions::new(), rec.callback()).unwrap();
    let queued = fx.engine.query(SPACE, Filter::new(), by_name(1), |_| {}).unwrap();
    fx.engine.flush().await;
    queued.unsubscribe();
    assert_eq!(fx.engine.queued_count(), 1);

    fx.engine.refresh_connect(true).await;

    let calls = rec.all();
    assert_eq!(calls.len(), 3);
    assert!(calls[1].result.is_empty());
    assert_eq!(calls[1].removed.len(), 3);
    assert_eq!(calls[2].result.len(), 3);
    assert_eq!(fx.engine.queued_count(), 0);
    assert_eq!(fx.engine.active_count(), 1);
}

#[tokio::test]
async fn test_reconnect_without_clean_keeps_result_visible() {
    let fx = Fixture::new();
    fx.create_spaces(2).await;
    let rec = Recorder::new();
    let _handle = fx.engine.query(SPACE, Filter::new(), FindOptions::new(), rec.callback()).unwrap();
    fx.engine.flush().await;

    fx.engine.refresh_connect(false).await;
    assert!(rec.all().iter().all(|changes| changes.result.len() == 2));
}

#[tokio::test]
async fn test_transient_failure_keeps_result() {
    let fx = Fixture::new();
    fx.create_spaces(2).await;
    let rec = Recorder::new();
    let _handle = fx.engine.query(SPACE, Filter::new(), FindOptions::new(), rec.callback()).unwrap();
    fx.engine.flush().await;

    fx.store.fail_next(1);
    fx.engine
        .handle_workspace_event(WorkspaceEvent::BulkUpdate {
            classes: vec![ClassRef::from(SPACE)],
        })
        .await;
    assert_eq!(rec.count(), 1);

    // The kept result still takes local patches
    fx.create_space("later").await;
    assert_eq!(rec.last().result.len(), 3);
}

#[tokio::test]
async fn test_stale_queued_query_refreshes_on_reactivation() {
    let fx = Fixture::new();
    fx.create_spaces(2).await;
    let handle = fx.engine.query(SPACE, Filter::new(), FindOptions::new(), |_| {}).unwrap();
    fx.engine.flush().await;
    handle.unsubscribe();

    fx.store.fail_next(1);
    fx.engine
        .handle_workspace_event(WorkspaceEvent::BulkUpdate {
            classes: vec![ClassRef::from(SPACE)],
        })
        .await;
    let calls = fx.store.find_all_calls();

    let rec = Recorder::new();
    let _handle = fx.engine.query(SPACE, Filter::new(), FindOptions::new(), rec.callback()).unwrap();
    assert_eq!(rec.count(), 1);
    fx.engine.flush().await;
    assert_eq!(rec.count(), 2);
    assert_eq!(fx.store.find_all_calls(), calls + 1);
}

#[tokio::test]
async fn test_find_one_propagates_backend_error() {
    let fx = Fixture::new();
    fx.create_spaces(1).await;
    fx.store.fail_next(1);
    let result = fx.engine.find_one(SPACE, Filter::new(), FindOptions::new()).await;
    assert!(matches!(result, Err(Error::Backend { .. })));
    assert_eq!(fx.engine.queued_count(), 0);
}

#[tokio::test]
async fn test_change_during_refresh_triggers_follow_up() {
    let fx = Fixture::new();
    fx.create_spaces(2).await;
    fx.store.set_latency(Some(Duration::from_millis(50)));

    let rec = Recorder::new();
    let _handle = fx.engine.query(SPACE, Filter::new(), FindOptions::new(), rec.callback()).unwrap();
    // Let the first fetch take its snapshot
    tokio::time::sleep(Duration::from_millis(10)).await;
    fx.create_space("late").await;
    fx.engine.flush().await;

    assert_eq!(fx.store.find_all_calls(), 2);
    assert_eq!(rec.count(), 1);
    assert_eq!(rec.last().result.len(), 3);
}

#[tokio::test]
async fn test_malformed_transaction_refreshes() {
    let fx = Fixture::new();
    let id = fx.create_space("name").await;
    let rec = Recorder::new();
    let _handle = fx.engine.query(SPACE, Filter::new(), FindOptions::new(), rec.callback()).unwrap();
    fx.engine.flush().await;
    let calls = fx.store.find_all_calls();

    let bad = fx
        .factory
        .update_doc(SPACE, MODEL_SPACE, &id, DocumentUpdate::new().inc("name", 1i64));
    fx.engine.tx(&[bad]).await;

    assert_eq!(fx.store.find_all_calls(), calls + 1);
    assert_eq!(names(&rec.last().result), vec!["name"]);
}

#[tokio::test]
async fn test_overflowing_increment_refreshes() {
    let fx = Fixture::new();
    let create = fx.factory.create_doc(
        SPACE,
        MODEL_SPACE,
        [("name", Value::from("big")), ("members", Value::from(i64::MAX))],
    );
    let id = create.object_id().cloned().unwrap();
    fx.commit(vec![create]).await;
    let rec = Recorder::new();
    let _handle = fx.engine.query(SPACE, Filter::new(), FindOptions::new(), rec.callback()).unwrap();
    fx.engine.flush().await;
    let calls = fx.store.find_all_calls();

    let bad = fx
        .factory
        .update_doc(SPACE, MODEL_SPACE, &id, DocumentUpdate::new().inc("members", 1i64));
    fx.engine.tx(&[bad]).await;

    assert_eq!(fx.store.find_all_calls(), calls + 1);
    assert_eq!(rec.last().result[0].get("members").as_deref(), Some(&Value::Int64(i64::MAX)));
}

#[tokio::test]
async fn test_batch_notifies_once() {
    let fx = Fixture::new();
    let rec = Recorder::new();
    let _handle = fx.engine.query(SPACE, Filter::new(), FindOptions::new(), rec.callback()).unwrap();
    fx.engine.flush().await;

    let batch = vec![
        fx.factory
            .create_doc(SPACE, MODEL_SPACE, [("name", "one")]),
        fx.factory
            .create_doc(SPACE, MODEL_SPACE, [("name", "two")]),
    ];
    fx.commit(batch).await;

    assert_eq!(rec.count(), 2);
    assert_eq!(rec.last().added.len(), 2);
}

#[tokio::test]
async fn test_total_tracks_local_patches() {
    let fx = Fixture::new();
    let ids = fx.create_spaces(4).await;
    let rec = Recorder::new();
    let _handle = fx
        .engine
        .query(SPACE, Filter::new(), by_name(2).with_total(), rec.callback())
        .unwrap();
    fx.engine.flush().await;
    assert_eq!(rec.last().total, Some(4));

    let calls = fx.store.find_all_calls();
    fx.create_space("zz").await;
    assert_eq!(rec.last().total, Some(5));
    assert_eq!(rec.last().result.len(), 2);
    assert_eq!(fx.store.find_all_calls(), calls);

    let remove = fx.factory.remove_doc(SPACE, MODEL_SPACE, &ids[0]);
    fx.commit(vec![remove]).await;
    let last = rec.last();
    assert_eq!(last.total, Some(4));
    assert_eq!(names(&last.result), vec!["space-01", "space-02"]);
}

#[tokio::test]
async fn test_mixin_query_membership() {
    let fx = Fixture::new();
    let id = fx.create_space("mixed").await;
    let rec = Recorder::new();
    let _handle = fx.engine.query(MIXIN, Filter::new(), FindOptions::new(), rec.callback()).unwrap();
    fx.engine.flush().await;
    assert!(rec.last().result.is_empty());

    let mixin = fx
        .factory
        .create_mixin(&id, SPACE, MODEL_SPACE, MIXIN, [("arr", Value::from(vec!["a"]))]);
    fx.commit(vec![mixin]).await;

    let last = rec.last();
    assert_eq!(last.result.len(), 1);
    assert_eq!(last.result[0].id, id);
}

#[tokio::test]
async fn test_listen_applies_committed_batches() {
    let fx = Fixture::new();
    let rec = Recorder::new();
    let _handle = fx.engine.query(SPACE, Filter::new(), FindOptions::new(), rec.callback()).unwrap();
    fx.engine.flush().await;
    let listener = fx.engine.listen(fx.store.subscribe());

    let tx = fx.factory.create_doc(SPACE, MODEL_SPACE, [("name", "pushed")]);
    fx.store.commit(vec![tx]).unwrap();
    rec.wait_for(2).await;

    assert_eq!(names(&rec.last().result), vec!["pushed"]);
    fx.engine.close();
    listener.abort();
}

#[tokio::test]
async fn test_queue_capacity_evicts_least_recent() {
    let fx = Fixture::with_config(LiveQueryConfig::new().with_queue_capacity(1));
    fx.create_spaces(2).await;
    let first = fx.engine.query(SPACE, Filter::new(), by_name(1), |_| {}).unwrap();
    let second = fx.engine.query(SPACE, Filter::new(), by_name(2), |_| {}).unwrap();
    fx.engine.flush().await;

    first.unsubscribe();
    second.unsubscribe();
    assert_eq!(fx.engine.queued_count(), 1);

    // The survivor is the most recently queued one
    let calls = fx.store.find_all_calls();
    fx.engine.find_all(SPACE, Filter::new(), by_name(2)).await.unwrap();
    assert_eq!(fx.store.find_all_calls(), calls);
    fx.engine.find_all(SPACE, Filter::new(), by_name(1)).await.unwrap();
    assert_eq!(fx.store.find_all_calls(), calls + 1);
}

#[tokio::test]
async fn test_close_is_idempotent() {
    let fx = Fixture::new();
    let rec = Recorder::new();
    fx.store.set_latency(Some(Duration::from_millis(20)));
    let handle = fx.engine.query(SPACE, Filter::new(), FindOptions::new(), rec.callback()).unwrap();

    fx.engine.close();
    fx.engine.close();
    assert!(fx.engine.is_closed());
    handle.unsubscribe();

    tokio::time::sleep(Duration::from_millis(40)).await;
    assert_eq!(rec.count(), 0);

    let result = fx.engine.query(SPACE, Filter::new(), FindOptions::new(), |_| {});
    assert!(matches!(result, Err(Error::Closed)));
    let result = fx.engine.find_one(SPACE, Filter::new(), FindOptions::new()).await;
    assert!(matches!(result, Err(Error::Closed)));
    fx.engine.tx(&[Tx::Workspace(WorkspaceEvent::BulkUpdate { classes: vec![] })]).await;
    fx.engine.refresh_connect(true).await;
    fx.engine.flush().await;
}

#[tokio::test]
async fn test_search_fulltext_passes_through() {
    let fx = Fixture::new();
    fx.create_space("needle").await;
    fx.create_space("hay").await;
    let found = fx.engine.search_fulltext("NEED", None).await.unwrap();
    assert_eq!(names(&found.docs), vec!["needle"]);
}

//! The split-by-day query middleware.
//!
//! One incoming range query becomes N per-day sub-queries, executed
//! concurrently against the downstream. The first failure cancels the
//! remaining sub-queries; if everything succeeds the sub-responses are
//! merged into a single response indistinguishable from an unsplit query.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::downstream::QueryRange;
use crate::error::{Error, Result};
use crate::merge::{merge, SubResponse};
use crate::server::request::RangeQuery;
use crate::server::response::QueryRangeResult;
use crate::split::split_by_day;

/// Middleware that splits a range query at UTC day boundaries, fans the
/// pieces out to the downstream, and merges the results.
pub struct SplitByDay {
    downstream: Arc<dyn QueryRange>,
}

impl SplitByDay {
    pub fn new(downstream: Arc<dyn QueryRange>) -> Self {
        Self { downstream }
    }

    /// Execute a range query.
    ///
    /// Every sub-query runs in its own task. A shared cancellation token is
    /// tripped on the first failure so outstanding downstream calls are
    /// abandoned promptly; the collector still waits for every task to
    /// report before returning, and discards whatever arrives after the
    /// failure. Dropping the returned future cancels the sub-queries too.
    pub async fn query_range(&self, query: RangeQuery) -> Result<QueryRangeResult> {
        let subqueries = split_by_day(&query);
        tracing::debug!(
            start = query.start,
            end = query.end,
            subqueries = subqueries.len(),
            "dispatching range query"
        );

        let token = CancellationToken::new();
        let _guard = token.clone().drop_guard();
        let (completion_tx, mut completion_rx) = mpsc::channel(subqueries.len());
        let expected = subqueries.len();

        for subquery in subqueries {
            let downstream = Arc::clone(&self.downstream);
            let token = token.clone();
            let completion_tx = completion_tx.clone();
            tokio::spawn(async move {
                let result = tokio::select! {
                    result = downstream.query_range(subquery.clone()) => result,
                    _ = token.cancelled() => Err(Error::Cancelled),
                };
                // The receiver only goes away if the whole query was
                // abandoned; nothing to report then.
                let _ = completion_tx.send((subquery, result)).await;
            });
        }
        drop(completion_tx);

        let mut responses = Vec::with_capacity(expected);
        let mut first_err: Option<Error> = None;
        while let Some((subquery, result)) = completion_rx.recv().await {
            if first_err.is_some() {
                continue;
            }
            match result {
                Ok(result) => responses.push(SubResponse {
                    query: subquery,
                    result,
                }),
                Err(err) => {
                    tracing::warn!(
                        start = subquery.start,
                        end = subquery.end,
                        error = %err,
                        "sub-query failed, cancelling peers"
                    );
                    token.cancel();
                    first_err = Some(err);
                }
            }
        }

        if let Some(err) = first_err {
            return Err(err);
        }
        merge(responses)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::server::response::{MatrixSeries, ResultData, SamplePair};
    use crate::split::MILLIS_PER_DAY;

    /// Stub downstream that answers each sub-query with a one-sample matrix
    /// at the sub-query's start, optionally failing one specific sub-query.
    struct StubDownstream {
        fail_at_start: Option<i64>,
        served: Mutex<Vec<i64>>,
    }

    impl StubDownstream {
        fn new() -> Self {
            Self {
                fail_at_start: None,
                served: Mutex::new(Vec::new()),
            }
        }

        fn failing_at(start: i64) -> Self {
            Self {
                fail_at_start: Some(start),
                served: Mutex::new(Vec::new()),
            }
        }

        fn served(&self) -> Vec<i64> {
            let mut served = self.served.lock().unwrap().clone();
            served.sort_unstable();
            served
        }
    }

    #[async_trait]
    impl QueryRange for StubDownstream {
        async fn query_range(&self, query: RangeQuery) -> Result<QueryRangeResult> {
            if self.fail_at_start == Some(query.start) {
                return Err(Error::Downstream {
                    status: Some(500),
                    message: "store exploded".to_string(),
                });
            }
            self.served.lock().unwrap().push(query.start);
            Ok(QueryRangeResult::new(ResultData::Matrix(vec![
                MatrixSeries {
                    metric: HashMap::new(),
                    values: vec![SamplePair::new(query.start, 1.0)],
                },
            ])))
        }
    }

    /// Stub whose sub-queries never complete on their own; only
    /// cancellation lets the executor finish.
    struct HangingDownstream;

    #[async_trait]
    impl QueryRange for HangingDownstream {
        async fn query_range(&self, _query: RangeQuery) -> Result<QueryRangeResult> {
            std::future::pending().await
        }
    }

    fn three_day_query() -> RangeQuery {
        RangeQuery {
            path: "/api/v1/query_range".to_string(),
            start: 0,
            end: 3 * MILLIS_PER_DAY,
            step: 15_000,
            query: "foo".to_string(),
        }
    }

    #[tokio::test]
    async fn should_merge_results_from_all_subqueries() {
        // given
        let downstream = Arc::new(StubDownstream::new());
        let frontend = SplitByDay::new(downstream.clone());

        // when
        let result = frontend.query_range(three_day_query()).await.unwrap();

        // then - one sub-query per day, merged into a single series
        assert_eq!(
            downstream.served(),
            vec![0, MILLIS_PER_DAY, 2 * MILLIS_PER_DAY]
        );
        let ResultData::Matrix(series) = result.result else {
            panic!("expected matrix result");
        };
        assert_eq!(series.len(), 1);
        assert_eq!(
            series[0].values,
            vec![
                SamplePair::new(0, 1.0),
                SamplePair::new(MILLIS_PER_DAY, 1.0),
                SamplePair::new(2 * MILLIS_PER_DAY, 1.0),
            ]
        );
    }

    #[tokio::test]
    async fn should_pass_single_day_query_through() {
        // given
        let downstream = Arc::new(StubDownstream::new());
        let frontend = SplitByDay::new(downstream.clone());
        let query = RangeQuery {
            end: 3_600_000,
            ..three_day_query()
        };

        // when
        let result = frontend.query_range(query).await.unwrap();

        // then
        assert_eq!(downstream.served(), vec![0]);
        let ResultData::Matrix(series) = result.result else {
            panic!("expected matrix result");
        };
        assert_eq!(series[0].values, vec![SamplePair::new(0, 1.0)]);
    }

    #[tokio::test]
    async fn should_return_first_error_without_merged_result() {
        // given - the middle sub-query fails
        let downstream = Arc::new(StubDownstream::failing_at(MILLIS_PER_DAY));
        let frontend = SplitByDay::new(downstream);

        // when
        let err = frontend.query_range(three_day_query()).await.unwrap_err();

        // then
        assert_eq!(
            err,
            Error::Downstream {
                status: Some(500),
                message: "store exploded".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn should_cancel_peers_when_one_subquery_fails() {
        // given - one sub-query fails immediately, every other one hangs
        // until cancelled
        struct FailOneHangRest;

        #[async_trait]
        impl QueryRange for FailOneHangRest {
            async fn query_range(&self, query: RangeQuery) -> Result<QueryRangeResult> {
                if query.start == 0 {
                    return Err(Error::Downstream {
                        status: None,
                        message: "connection refused".to_string(),
                    });
                }
                std::future::pending().await
            }
        }

        let frontend = SplitByDay::new(Arc::new(FailOneHangRest));

        // when - completes only if the failure cancels the hanging peers
        let err = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            frontend.query_range(three_day_query()),
        )
        .await
        .expect("executor must cancel hanging peers")
        .unwrap_err();

        // then
        assert!(matches!(err, Error::Downstream { status: None, .. }));
    }

    #[tokio::test]
    async fn should_cancel_subqueries_when_caller_gives_up() {
        // given
        let frontend = Arc::new(SplitByDay::new(Arc::new(HangingDownstream)));

        // when - the caller abandons the query wholesale
        let frontend_clone = frontend.clone();
        let handle = tokio::spawn(async move {
            let _ = frontend_clone.query_range(three_day_query()).await;
        });
        tokio::task::yield_now().await;
        handle.abort();

        // then - the abort must not wedge the runtime; give the spawned
        // sub-tasks a moment to observe the cancellation
        let _ = handle.await;
        tokio::time::timeout(std::time::Duration::from_secs(1), tokio::task::yield_now())
            .await
            .unwrap();
    }
}

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use futures::Stream;
use uuid::Uuid;

use pinpool_api::notify::{Notification, NotificationSink};

use crate::pool::error::TaskFailure;
use crate::pool::task::TaskReport;

/// Reports of one submit call, yielded in arrival order.
///
/// Each call owns its result channel, so reports from concurrent calls never
/// mix. The stream ends once every targeted worker has reported. If the
/// remaining tasks were discarded by a dismissal, a `Discarded` report is
/// produced for each of their workers instead of waiting forever.
pub struct ResultStream<T> {
    call_id: Uuid,
    receiver: flume::Receiver<TaskReport<T>>,
    pending: BTreeSet<usize>,
    sink: Option<Arc<dyn NotificationSink>>,
}

impl<T> fmt::Debug for ResultStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultStream")
            .field("call_id", &self.call_id)
            .field("pending", &self.pending)
            .finish()
    }
}

impl<T> ResultStream<T> {
    pub(crate) fn new(
        call_id: Uuid,
        receiver: flume::Receiver<TaskReport<T>>,
        pending: BTreeSet<usize>,
        sink: Option<Arc<dyn NotificationSink>>,
    ) -> Self {
        Self {
            call_id,
            receiver,
            pending,
            sink,
        }
    }

    pub fn call_id(&self) -> Uuid {
        self.call_id
    }

    /// Workers that have not reported yet.
    pub fn pending(&self) -> impl Iterator<Item = usize> + '_ {
        self.pending.iter().copied()
    }

    pub fn is_finished(&self) -> bool {
        self.pending.is_empty()
    }

    /// Wait for the next report, or `None` once every worker has reported.
    pub async fn next_report(&mut self) -> Option<TaskReport<T>> {
        while !self.pending.is_empty() {
            let received = self.receiver.recv_async().await;
            if let Some(report) = self.accept(received) {
                return Some(report);
            }
        }
        None
    }

    /// Blocking variant of [`next_report`](Self::next_report).
    pub fn next_report_blocking(&mut self) -> Option<TaskReport<T>> {
        while !self.pending.is_empty() {
            let received = self.receiver.recv();
            if let Some(report) = self.accept(received) {
                return Some(report);
            }
        }
        None
    }

    /// Wait for all remaining reports.
    pub async fn collect_all(mut self) -> Vec<TaskReport<T>> {
        let mut reports = Vec::with_capacity(self.pending.len());
        while let Some(report) = self.next_report().await {
            reports.push(report);
        }
        reports
    }

    pub fn collect_blocking(mut self) -> Vec<TaskReport<T>> {
        let mut reports = Vec::with_capacity(self.pending.len());
        while let Some(report) = self.next_report_blocking() {
            reports.push(report);
        }
        reports
    }

    pub fn into_stream(self) -> impl Stream<Item = TaskReport<T>> {
        futures::stream::unfold(self, |mut stream| async move {
            stream.next_report().await.map(|report| (report, stream))
        })
    }

    fn accept<E>(&mut self, received: Result<TaskReport<T>, E>) -> Option<TaskReport<T>> {
        let report = match received {
            Ok(report) => {
                if !self.pending.remove(&report.task.worker) {
                    tracing::warn!(
                        call_id = %self.call_id,
                        worker = report.task.worker,
                        "ignoring report from a worker outside the pending set"
                    );
                    return None;
                }
                report
            }
            Err(_) => {
                // Every sender is gone: the remaining tasks will never run.
                let worker = self.pending.pop_first()?;
                TaskReport::new(self.call_id, worker, Err(TaskFailure::Discarded))
            }
        };
        self.notify(&report);
        Some(report)
    }

    fn notify(&self, report: &TaskReport<T>) {
        let Some(sink) = &self.sink else {
            return;
        };
        let notification = match &report.outcome {
            Ok(_) => Notification::message(
                200,
                format!("Worker {} completed task {}", report.task.worker, self.call_id),
            ),
            Err(failure) => Notification::message(
                500,
                format!("Worker {} failed task {}: {}", report.task.worker, self.call_id, failure),
            ),
        };
        sink.notify(notification);
    }
}

//! Pull-based cache-then-live feature iterator.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::mpsc::RecvTimeoutError;

use geofetch_core::{
    DownloadError, DownloadResult, FeatureQuery, FeatureRecord, FieldValue, GeometryTransform,
    InterruptionChecker,
};

use crate::context::{SharedDownloadContext, Subscription, SubscriptionMode};

/// Where the iterator currently sources features from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum IterState {
    ConsumingCache,
    AwaitingLive,
    ConsumingLive,
    Closed,
}

enum LivePoll {
    Record(FeatureRecord),
    Pending,
    Finished,
}

/// Pull-based stream over one query: already-cached features first, then
/// the live download's output, as a single ordered sequence.
///
/// Cached features (as of the generation captured at construction) are
/// exhausted before any live feature is consulted, and once live
/// consumption starts the iterator never reverts to the cache. The cache
/// is authoritative for duplicate identifiers: live records whose
/// identifier was already seen in the cache pass are silently skipped.
///
/// While no live data is ready, [`next_feature`](Self::next_feature)
/// suspends cooperatively on the subscription's event channel, polling
/// the optional interruption source at the configured interval.
pub struct FeatureIterator {
    ctx: Arc<SharedDownloadContext>,
    query: FeatureQuery,
    subscription: Option<Subscription>,
    state: IterState,
    generation: u64,
    cache_records: Vec<FeatureRecord>,
    cache_pos: usize,
    live_snapshot: Vec<FeatureRecord>,
    live_pos: usize,
    yielded_ids: HashSet<String>,
    yielded: u64,
    download_done: bool,
    attribute_indexes: Option<Vec<usize>>,
    transform: Option<Arc<dyn GeometryTransform>>,
    interrupt: Option<Arc<dyn InterruptionChecker>>,
}

impl FeatureIterator {
    /// Create an iterator over `query`, subscribed to the context's live
    /// download when `subscription` is given.
    #[must_use]
    pub fn new(
        ctx: Arc<SharedDownloadContext>,
        query: FeatureQuery,
        subscription: Option<Subscription>,
    ) -> Self {
        let generation = ctx.cache().generation();
        let cache_records = ctx.cache().snapshot(generation);
        let attribute_indexes = if query.has_attribute_subset() {
            // Names the schema does not know are ignored.
            Some(
                query
                    .attributes
                    .iter()
                    .filter_map(|name| ctx.schema().field_index(name))
                    .collect(),
            )
        } else {
            None
        };
        let state = if cache_records.is_empty() {
            IterState::AwaitingLive
        } else {
            IterState::ConsumingCache
        };
        let download_done = ctx.download_state().is_finished();
        let live_pos = cache_records.len();

        Self {
            ctx,
            query,
            subscription,
            state,
            generation,
            cache_records,
            cache_pos: 0,
            live_snapshot: Vec::new(),
            live_pos,
            yielded_ids: HashSet::new(),
            yielded: 0,
            download_done,
            attribute_indexes,
            transform: None,
            interrupt: None,
        }
    }

    /// Apply a CRS transform to yielded geometries when the query names a
    /// target CRS.
    #[must_use]
    pub fn with_transform(mut self, transform: Arc<dyn GeometryTransform>) -> Self {
        self.transform = Some(transform);
        self
    }

    /// Poll `checker` while blocked, so an external source can abort the
    /// fetch with [`DownloadError::Interrupted`].
    #[must_use]
    pub fn with_interruption_checker(mut self, checker: Arc<dyn InterruptionChecker>) -> Self {
        self.interrupt = Some(checker);
        self
    }

    /// Pull the next record, blocking cooperatively while the live
    /// download catches up.
    ///
    /// `Ok(None)` is end of stream (also after close). `Interrupted` is
    /// returned when the external interruption source fires while
    /// waiting; partial results already yielded remain valid.
    pub fn next_feature(&mut self) -> DownloadResult<Option<FeatureRecord>> {
        loop {
            if self.query.limit > 0 && self.yielded >= self.query.limit {
                return Ok(None);
            }
            match self.state {
                IterState::Closed => return Ok(None),
                IterState::ConsumingCache => {
                    if self.cache_pos < self.cache_records.len() {
                        let record = self.cache_records[self.cache_pos].clone();
                        self.cache_pos += 1;
                        self.yielded_ids.insert(record.id.clone());
                        if let Some(out) = self.copy_feature(record)? {
                            self.yielded += 1;
                            return Ok(Some(out));
                        }
                    } else {
                        self.state = IterState::AwaitingLive;
                    }
                }
                IterState::AwaitingLive | IterState::ConsumingLive => match self.poll_live()? {
                    LivePoll::Record(record) => {
                        self.state = IterState::ConsumingLive;
                        if !self.yielded_ids.insert(record.id.clone()) {
                            // The cache pass already covered this identifier.
                            continue;
                        }
                        if let Some(out) = self.copy_feature(record)? {
                            self.yielded += 1;
                            return Ok(Some(out));
                        }
                    }
                    LivePoll::Finished => return Ok(None),
                    LivePoll::Pending => self.wait_for_event()?,
                },
            }
        }
    }

    /// Reset to the start of the cache-then-live order against the
    /// current cache generation. Never re-triggers a network download;
    /// live features already persisted to the cache replay from there.
    pub fn rewind(&mut self) -> DownloadResult<()> {
        if self.state == IterState::Closed {
            return Err(DownloadError::Closed);
        }
        self.generation = self.ctx.cache().generation();
        self.cache_records = self.ctx.cache().snapshot(self.generation);
        self.cache_pos = 0;
        self.live_snapshot.clear();
        self.live_pos = self.cache_records.len();
        self.yielded_ids.clear();
        self.yielded = 0;
        self.download_done = self.ctx.download_state().is_finished();
        self.state = if self.cache_records.is_empty() {
            IterState::AwaitingLive
        } else {
            IterState::ConsumingCache
        };
        Ok(())
    }

    /// Release the spill buffer (deleting its temp segments) and
    /// unsubscribe from the download. Idempotent; further pulls return
    /// end of stream.
    pub fn close(&mut self) {
        if self.state == IterState::Closed {
            return;
        }
        if let Some(subscription) = self.subscription.take() {
            if let Some(spill) = &subscription.spill {
                spill.close();
            }
            self.ctx.unsubscribe(subscription.id());
        }
        self.cache_records.clear();
        self.live_snapshot.clear();
        self.yielded_ids.clear();
        self.state = IterState::Closed;
    }

    /// Number of records yielded so far.
    #[must_use]
    pub const fn yielded_count(&self) -> u64 {
        self.yielded
    }

    fn poll_live(&mut self) -> DownloadResult<LivePoll> {
        if let Some(record) = self.try_take_live()? {
            return Ok(LivePoll::Record(record));
        }
        if self.download_done || self.ctx.download_state().is_finished() {
            self.download_done = true;
            // A batch may have landed between the take above and the
            // terminal-state observation; drain once more.
            if let Some(record) = self.try_take_live()? {
                return Ok(LivePoll::Record(record));
            }
            return Ok(LivePoll::Finished);
        }
        Ok(LivePoll::Pending)
    }

    fn try_take_live(&mut self) -> DownloadResult<Option<FeatureRecord>> {
        let Some(subscription) = &self.subscription else {
            return Ok(None);
        };
        match subscription.mode() {
            SubscriptionMode::Payload => match &subscription.spill {
                Some(spill) => spill.pop_record(),
                None => Ok(None),
            },
            SubscriptionMode::CountOnly => {
                if self.live_pos >= self.live_snapshot.len() {
                    self.live_snapshot = self.ctx.cache().snapshot(self.generation);
                }
                if self.live_pos < self.live_snapshot.len() {
                    let record = self.live_snapshot[self.live_pos].clone();
                    self.live_pos += 1;
                    return Ok(Some(record));
                }
                Ok(None)
            }
        }
    }

    /// Suspend until a batch arrives, the download terminates, or the
    /// poll interval elapses (at which point the interruption source is
    /// consulted).
    fn wait_for_event(&mut self) -> DownloadResult<()> {
        if self.ctx.download_state().is_finished() {
            self.download_done = true;
            return Ok(());
        }
        let Some(subscription) = &self.subscription else {
            self.download_done = true;
            return Ok(());
        };
        match subscription
            .events()
            .recv_timeout(self.ctx.config().interruption_poll_interval)
        {
            Ok(event) => {
                if event.is_terminal() {
                    self.download_done = true;
                }
                Ok(())
            }
            Err(RecvTimeoutError::Timeout) => {
                if self.is_interrupted() {
                    return Err(DownloadError::Interrupted);
                }
                Ok(())
            }
            Err(RecvTimeoutError::Disconnected) => {
                self.download_done = true;
                Ok(())
            }
        }
    }

    fn is_interrupted(&self) -> bool {
        self.interrupt.as_ref().is_some_and(|c| c.is_interrupted())
            || self.ctx.is_stop_requested()
    }

    /// Project `record` onto the query: spatial clip, optional CRS
    /// transform, then the requested attribute subset.
    ///
    /// Returns `Ok(None)` for features the filter rectangle excludes;
    /// skipped features do not count toward the client-visible total.
    /// Features without a known extent cannot be clipped and pass
    /// through.
    fn copy_feature(&self, record: FeatureRecord) -> DownloadResult<Option<FeatureRecord>> {
        if let Some(rect) = &self.query.filter_rect {
            if let Some(bbox) = record.feature.geometry.as_ref().and_then(|g| g.bbox.as_ref()) {
                if !rect.intersects(bbox) {
                    return Ok(None);
                }
            }
        }

        let FeatureRecord { mut feature, id } = record;

        if self.query.target_crs.is_some() {
            if let (Some(transform), Some(geometry)) =
                (&self.transform, feature.geometry.as_mut())
            {
                transform.transform(geometry)?;
            }
        }

        if let Some(indexes) = &self.attribute_indexes {
            let projected: Vec<FieldValue> = indexes
                .iter()
                .map(|&index| feature.attribute(index).clone())
                .collect();
            feature.attributes = projected;
        }

        Ok(Some(FeatureRecord::new(feature, id)))
    }
}

impl Iterator for FeatureIterator {
    type Item = DownloadResult<FeatureRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_feature().transpose()
    }
}

impl Drop for FeatureIterator {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{DownloadState, testing::null_context};
    use geofetch_core::{
        BoundingBox, DownloadConfig, Feature, FieldValue, Geometry, IdentityTransform,
    };

    fn record(id: &str, x: f64) -> FeatureRecord {
        FeatureRecord::new(
            Feature::new(vec![
                FieldValue::String(format!("name of {id}")),
                FieldValue::Double(x),
            ])
            .with_geometry(Geometry::new(
                vec![1],
                Some(BoundingBox::new(x, 0.0, x, 0.0)),
            )),
            id,
        )
    }

    fn finished_context_with_cache(
        records: &[FeatureRecord],
    ) -> Arc<SharedDownloadContext> {
        let ctx = null_context(DownloadConfig::default());
        ctx.cache().append(records);
        ctx.set_download_state(DownloadState::Finished { success: true });
        ctx
    }

    #[test]
    fn yields_cache_then_end_of_stream() {
        let ctx = finished_context_with_cache(&[record("a", 1.0), record("b", 2.0)]);
        let mut iter = FeatureIterator::new(ctx, FeatureQuery::all(), None);

        assert_eq!(iter.next_feature().unwrap().unwrap().id, "a");
        assert_eq!(iter.next_feature().unwrap().unwrap().id, "b");
        assert!(iter.next_feature().unwrap().is_none());
        assert_eq!(iter.yielded_count(), 2);
    }

    #[test]
    fn attribute_subset_projects_fields_in_query_order() {
        let ctx = finished_context_with_cache(&[record("a", 3.5)]);
        let query = FeatureQuery::all().with_attributes(vec!["height".into(), "name".into()]);
        let mut iter = FeatureIterator::new(ctx, query, None);

        let feature = iter.next_feature().unwrap().unwrap().feature;
        assert_eq!(
            feature.attributes,
            vec![
                FieldValue::Double(3.5),
                FieldValue::String("name of a".into()),
            ]
        );
    }

    #[test]
    fn filter_rect_skips_non_matching_features_silently() {
        let ctx = finished_context_with_cache(&[
            record("inside", 5.0),
            record("outside", 50.0),
            record("also-inside", 7.0),
        ]);
        let query = FeatureQuery::all().with_filter_rect(BoundingBox::new(0.0, 0.0, 10.0, 10.0));
        let mut iter = FeatureIterator::new(ctx, query, None);

        assert_eq!(iter.next_feature().unwrap().unwrap().id, "inside");
        assert_eq!(iter.next_feature().unwrap().unwrap().id, "also-inside");
        assert!(iter.next_feature().unwrap().is_none());
        assert_eq!(iter.yielded_count(), 2);
    }

    #[test]
    fn limit_caps_yielded_features() {
        let ctx = finished_context_with_cache(&[
            record("a", 1.0),
            record("b", 2.0),
            record("c", 3.0),
        ]);
        let mut iter = FeatureIterator::new(ctx, FeatureQuery::all().with_limit(2), None);

        assert!(iter.next_feature().unwrap().is_some());
        assert!(iter.next_feature().unwrap().is_some());
        assert!(iter.next_feature().unwrap().is_none());
    }

    #[test]
    fn transform_is_applied_when_target_crs_requested() {
        let ctx = finished_context_with_cache(&[record("a", 1.0)]);
        let query = FeatureQuery::all().with_target_crs("EPSG:4326");
        let mut iter = FeatureIterator::new(ctx, query, None)
            .with_transform(Arc::new(IdentityTransform::new()));

        let out = iter.next_feature().unwrap().unwrap();
        assert!(out.feature.geometry.is_some());
    }

    #[test]
    fn rewind_restarts_from_the_first_feature() {
        let ctx = finished_context_with_cache(&[record("a", 1.0), record("b", 2.0)]);
        let mut iter = FeatureIterator::new(ctx, FeatureQuery::all(), None);

        assert_eq!(iter.next_feature().unwrap().unwrap().id, "a");
        iter.rewind().unwrap();
        assert_eq!(iter.next_feature().unwrap().unwrap().id, "a");
        assert_eq!(iter.yielded_count(), 1);
    }

    #[test]
    fn close_is_idempotent_and_ends_the_stream() {
        let ctx = finished_context_with_cache(&[record("a", 1.0)]);
        let mut iter = FeatureIterator::new(ctx, FeatureQuery::all(), None);

        iter.close();
        iter.close();
        assert!(iter.next_feature().unwrap().is_none());
        assert!(matches!(iter.rewind(), Err(DownloadError::Closed)));
    }

    #[test]
    fn iterator_adapter_yields_results() {
        let ctx = finished_context_with_cache(&[record("a", 1.0), record("b", 2.0)]);
        let iter = FeatureIterator::new(ctx, FeatureQuery::all(), None);

        let ids: Vec<_> = iter.map(|r| r.unwrap().id).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}

use std::{
    path::Path,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use anyhow::anyhow;
use kura_handle::RefMessage;
use kura_utils::{FxHashMap, FxHashSet};
use parking_lot::Mutex;
use rayon::ThreadPool;
use uuid::Uuid;

use crate::{
    Asset, AssetKind, AssetOptions, Bundle, ErasedHandle, HandleAllocator, LoadResponder,
    LoadedAssets, PreloadResponder, RequestItem, SceneAsset,
};

type Materialize = Arc<dyn Fn(&HandleAllocator, Uuid) -> ErasedHandle + Send + Sync>;
type Job = Box<dyn FnOnce(&MemoryBundleInner) + Send>;

struct Record {
    uuid: Uuid,
    kind: AssetKind,
    materialize: Materialize,
    live: Option<ErasedHandle>,
}

struct MemoryBundleInner {
    name: String,
    allocator: HandleAllocator,
    unload_recv: flume::Receiver<RefMessage>,
    records: Mutex<FxHashMap<String, Record>>,
    failing: Mutex<FxHashSet<String>>,
}

impl MemoryBundleInner {
    fn check_failure(&self, url: &str) -> anyhow::Result<()> {
        if self.failing.lock().contains(url) {
            return Err(anyhow!("Bundle {} failed to fetch {}", self.name, url));
        }
        Ok(())
    }
    fn fetch(&self, url: &str, kind: AssetKind, reload: bool) -> anyhow::Result<ErasedHandle> {
        self.check_failure(url)?;

        let mut records = self.records.lock();
        let record = records
            .get_mut(url)
            .ok_or_else(|| anyhow!("{} not found in bundle {}", url, self.name))?;
        if record.kind != kind {
            return Err(anyhow!("{} is a {}, not a {}", url, record.kind, kind));
        }
        if reload {
            record.live = None;
        }

        let handle = match &record.live {
            Some(handle) => handle.clone(),
            None => {
                let handle = (record.materialize)(&self.allocator, record.uuid);
                record.live = Some(handle.clone());
                handle
            }
        };

        Ok(handle)
    }
    fn describe(&self, url: &str) -> anyhow::Result<RequestItem> {
        self.check_failure(url)?;

        let records = self.records.lock();
        let record = records
            .get(url)
            .ok_or_else(|| anyhow!("{} not found in bundle {}", url, self.name))?;

        Ok(RequestItem {
            uuid: record.uuid,
            url: url.to_owned(),
            kind: record.kind.name(),
        })
    }
    fn list_dir(&self, prefix: &str, kind: Option<AssetKind>) -> Vec<String> {
        let dir = prefix.trim_end_matches('/');
        let dir_prefix = format!("{}/", dir);
        let records = self.records.lock();
        let mut urls: Vec<String> = records
            .iter()
            .filter(|(url, record)| {
                (dir.is_empty() || url.starts_with(&dir_prefix))
                    && kind.map_or(true, |kind| record.kind == kind)
            })
            .map(|(url, _)| url.clone())
            .collect();
        urls.sort();

        urls
    }
    fn load_urls(&self, urls: &[String], kind: AssetKind, reload: bool, responder: LoadResponder) {
        let total = urls.len();
        let mut handles = Vec::with_capacity(total);
        for (ix, url) in urls.iter().enumerate() {
            match self.fetch(url, kind, reload) {
                Ok(handle) => handles.push(handle),
                Err(err) => return responder.complete(Err(err)),
            }
            responder.progress(ix + 1, total);
        }

        let loaded = match <[ErasedHandle; 1]>::try_from(handles) {
            Ok([handle]) => LoadedAssets::One(handle),
            Err(handles) => LoadedAssets::Many(handles),
        };
        responder.complete(Ok(loaded));
    }
}

enum Dispatch {
    Immediate,
    ThreadPool(Arc<ThreadPool>),
    Deferred(Mutex<Vec<Job>>),
}

/// A bundle whose assets live in memory.
///
/// Assets are materialized into handles on first load and handed out again on
/// later loads until their last retain is released and [`MemoryBundle::update`]
/// processes the release. Work runs on the calling thread, on a rayon pool, or
/// is queued until [`MemoryBundle::run_deferred`].
pub struct MemoryBundle {
    inner: Arc<MemoryBundleInner>,
    dispatch: Dispatch,
    calls: AtomicUsize,
}

impl MemoryBundle {
    fn with_dispatch(name: &str, dispatch: Dispatch) -> Self {
        let (sender, unload_recv) = flume::unbounded();
        Self {
            inner: Arc::new(MemoryBundleInner {
                name: name.to_owned(),
                allocator: HandleAllocator::new(sender),
                unload_recv,
                records: Mutex::new(FxHashMap::default()),
                failing: Mutex::new(FxHashSet::default()),
            }),
            dispatch,
            calls: AtomicUsize::new(0),
        }
    }
    /// Completes every request before returning from the call that issued it
    pub fn new(name: &str) -> Self {
        Self::with_dispatch(name, Dispatch::Immediate)
    }
    pub fn with_threadpool(name: &str, thread_pool: Arc<ThreadPool>) -> Self {
        Self::with_dispatch(name, Dispatch::ThreadPool(thread_pool))
    }
    /// Queues every request until [`MemoryBundle::run_deferred`]
    pub fn deferred(name: &str) -> Self {
        Self::with_dispatch(name, Dispatch::Deferred(Mutex::new(Vec::new())))
    }
    /// Adds an asset under `url`. Its name is the file stem of the url.
    pub fn insert<T: Asset + Clone>(&self, url: &str, asset: T) -> Uuid {
        let name = Path::new(url)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or(url)
            .to_owned();
        let materialize: Materialize = Arc::new(move |allocator, uuid| {
            allocator
                .allocate(name.clone(), uuid, asset.clone())
                .clone_erased()
        });

        let uuid = Uuid::new_v4();
        self.inner.records.lock().insert(
            url.to_owned(),
            Record {
                uuid,
                kind: AssetKind::of::<T>(),
                materialize,
                live: None,
            },
        );

        uuid
    }
    pub fn insert_scene(&self, url: &str, scene: SceneAsset) -> Uuid {
        self.insert(url, scene)
    }
    /// Makes every later fetch of `url` fail
    pub fn fail_on(&self, url: &str) {
        self.inner.failing.lock().insert(url.to_owned());
    }
    /// Number of load and preload calls received so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
    /// Whether `url` currently has a materialized handle
    pub fn is_live(&self, url: &str) -> bool {
        self.inner
            .records
            .lock()
            .get(url)
            .map_or(false, |record| record.live.is_some())
    }
    /// Runs the queued requests of a deferred bundle, returns how many ran
    pub fn run_deferred(&self) -> usize {
        let jobs = match &self.dispatch {
            Dispatch::Deferred(queue) => std::mem::take(&mut *queue.lock()),
            _ => return 0,
        };
        let count = jobs.len();
        for job in jobs {
            job(&self.inner);
        }

        count
    }
    /// Drops the handles whose last retain was released, so the next load
    /// materializes them again. Returns how many were dropped.
    pub fn update(&self) -> usize {
        let mut unloaded = 0;
        for message in self.inner.unload_recv.try_iter() {
            let RefMessage::Unload(id) = message;

            let mut records = self.inner.records.lock();
            let released = records.values_mut().find(|record| {
                record
                    .live
                    .as_ref()
                    .map_or(false, |live| live.id() == id && live.ref_count() == 0)
            });
            if let Some(record) = released {
                // Ids are never handed out again: stale clones of this handle may
                // still report `Unload(id)` later and must not match a newer handle
                record.live = None;
                unloaded += 1;
                log::debug!("Unloaded asset {} from bundle {}", id, self.inner.name);
            }
        }

        unloaded
    }
    fn dispatch(&self, job: impl FnOnce(&MemoryBundleInner) + Send + 'static) {
        self.calls.fetch_add(1, Ordering::Relaxed);
        match &self.dispatch {
            Dispatch::Immediate => job(&self.inner),
            Dispatch::ThreadPool(thread_pool) => {
                let inner = self.inner.clone();
                thread_pool.spawn(move || job(&inner));
            }
            Dispatch::Deferred(queue) => queue.lock().push(Box::new(job)),
        }
    }
}

impl Bundle for MemoryBundle {
    fn name(&self) -> &str {
        &self.inner.name
    }
    fn load(&self, urls: &[String], kind: AssetKind, responder: LoadResponder) {
        let urls = urls.to_vec();
        self.dispatch(move |inner| inner.load_urls(&urls, kind, false, responder));
    }
    fn load_dir(&self, prefix: &str, kind: AssetKind, responder: LoadResponder) {
        let prefix = prefix.to_owned();
        self.dispatch(move |inner| {
            let urls = inner.list_dir(&prefix, Some(kind));
            let total = urls.len();
            let mut handles = Vec::with_capacity(total);
            for (ix, url) in urls.iter().enumerate() {
                match inner.fetch(url, kind, false) {
                    Ok(handle) => handles.push(handle),
                    Err(err) => return responder.complete(Err(err)),
                }
                responder.progress(ix + 1, total);
            }
            responder.complete(Ok(LoadedAssets::Many(handles)));
        });
    }
    fn load_scene(&self, url: &str, options: AssetOptions, responder: LoadResponder) {
        let url = url.to_owned();
        self.dispatch(move |inner| {
            if options.cache_asset {
                log::debug!("Scene {} requested with asset caching", url);
            }
            inner.load_urls(
                &[url],
                AssetKind::of::<SceneAsset>(),
                options.reload_asset,
                responder,
            )
        });
    }
    fn preload(&self, urls: &[String], responder: PreloadResponder) {
        let urls = urls.to_vec();
        self.dispatch(move |inner| {
            let items = urls.iter().map(|url| inner.describe(url)).collect();
            responder.complete(items);
        });
    }
    fn preload_dir(&self, prefix: &str, responder: PreloadResponder) {
        let prefix = prefix.to_owned();
        self.dispatch(move |inner| {
            let items = inner
                .list_dir(&prefix, None)
                .iter()
                .map(|url| inner.describe(url))
                .collect();
            responder.complete(items);
        });
    }
    fn preload_scene(&self, url: &str, responder: PreloadResponder) {
        let url = url.to_owned();
        self.dispatch(move |inner| {
            let item = inner.describe(&url).and_then(|item| {
                if item.kind == SceneAsset::NAME {
                    Ok(vec![item])
                } else {
                    Err(anyhow!("{} is a {}, not a scene", url, item.kind))
                }
            });
            responder.complete(item);
        });
    }
}

impl std::fmt::Debug for MemoryBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBundle")
            .field("name", &self.inner.name)
            .field("assets", &self.inner.records.lock().len())
            .field("calls", &self.calls())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Sprite(u32);
    impl Asset for Sprite {
        const NAME: &'static str = "Sprite";
    }

    #[derive(Default)]
    struct Recorded {
        progress: Vec<(usize, usize)>,
        outcome: Option<Result<Vec<ErasedHandle>, String>>,
        abandoned: bool,
    }

    fn responder(recorded: &Arc<Mutex<Recorded>>) -> LoadResponder {
        let progress = recorded.clone();
        let complete = recorded.clone();
        LoadResponder::new(
            move |finished, total| progress.lock().progress.push((finished, total)),
            move |outcome| match outcome {
                Some(result) => {
                    complete.lock().outcome =
                        Some(result.map(LoadedAssets::into_vec).map_err(|e| e.to_string()))
                }
                None => complete.lock().abandoned = true,
            },
        )
    }

    fn urls(urls: &[&str]) -> Vec<String> {
        urls.iter().map(|url| (*url).to_owned()).collect()
    }

    #[test]
    fn test_load_reports_progress_per_url() {
        let bundle = MemoryBundle::new("main");
        bundle.insert("a.png", Sprite(1));
        bundle.insert("b.png", Sprite(2));
        let recorded = Arc::new(Mutex::new(Recorded::default()));

        bundle.load(
            &urls(&["a.png", "b.png"]),
            AssetKind::of::<Sprite>(),
            responder(&recorded),
        );

        let recorded = recorded.lock();
        assert_eq!(recorded.progress, vec![(1, 2), (2, 2)]);
        let handles = recorded.outcome.clone().unwrap().unwrap();
        assert_eq!(handles.len(), 2);
        assert_eq!(handles[0].name(), "a");
        assert_eq!(*handles[1].clone_typed::<Sprite>().unwrap(), Sprite(2));
    }

    #[test]
    fn test_repeated_loads_share_handle() {
        let bundle = MemoryBundle::new("main");
        bundle.insert("a.png", Sprite(1));
        let first = Arc::new(Mutex::new(Recorded::default()));
        let second = Arc::new(Mutex::new(Recorded::default()));

        bundle.load(&urls(&["a.png"]), AssetKind::of::<Sprite>(), responder(&first));
        bundle.load(&urls(&["a.png"]), AssetKind::of::<Sprite>(), responder(&second));

        let first = first.lock().outcome.clone().unwrap().unwrap();
        let second = second.lock().outcome.clone().unwrap().unwrap();
        assert_eq!(first[0], second[0]);
        assert_eq!(bundle.calls(), 2);
    }

    #[test]
    fn test_missing_and_failing_urls() {
        let bundle = MemoryBundle::new("main");
        bundle.insert("a.png", Sprite(1));
        bundle.fail_on("a.png");
        let missing = Arc::new(Mutex::new(Recorded::default()));
        let failing = Arc::new(Mutex::new(Recorded::default()));

        bundle.load(&urls(&["nope.png"]), AssetKind::of::<Sprite>(), responder(&missing));
        bundle.load(&urls(&["a.png"]), AssetKind::of::<Sprite>(), responder(&failing));

        assert!(missing.lock().outcome.clone().unwrap().is_err());
        assert!(failing.lock().outcome.clone().unwrap().is_err());
        assert!(!bundle.is_live("a.png"));
    }

    #[test]
    fn test_load_dir_filters_kind_and_prefix() {
        let bundle = MemoryBundle::new("main");
        bundle.insert("sprites/y.png", Sprite(2));
        bundle.insert("sprites/x.png", Sprite(1));
        bundle.insert("other/z.png", Sprite(3));
        bundle.insert_scene("sprites/level.scene", SceneAsset::default());
        let recorded = Arc::new(Mutex::new(Recorded::default()));

        bundle.load_dir("sprites/", AssetKind::of::<Sprite>(), responder(&recorded));

        let handles = recorded.lock().outcome.clone().unwrap().unwrap();
        let names: Vec<&str> = handles.iter().map(|handle| handle.name()).collect();
        assert_eq!(names, vec!["x", "y"]);
    }

    #[test]
    fn test_scene_reload_materializes_again() {
        let bundle = MemoryBundle::new("main");
        bundle.insert_scene("level.scene", SceneAsset::default());
        let first = Arc::new(Mutex::new(Recorded::default()));
        let second = Arc::new(Mutex::new(Recorded::default()));

        bundle.load_scene("level.scene", AssetOptions::default(), responder(&first));
        bundle.load_scene(
            "level.scene",
            AssetOptions {
                reload_asset: true,
                cache_asset: false,
            },
            responder(&second),
        );

        let first = first.lock().outcome.clone().unwrap().unwrap();
        let second = second.lock().outcome.clone().unwrap().unwrap();
        assert_ne!(first[0], second[0]);
    }

    #[test]
    fn test_deferred_runs_on_demand() {
        let bundle = MemoryBundle::deferred("main");
        bundle.insert("a.png", Sprite(1));
        let recorded = Arc::new(Mutex::new(Recorded::default()));

        bundle.load(&urls(&["a.png"]), AssetKind::of::<Sprite>(), responder(&recorded));
        assert!(recorded.lock().outcome.is_none());

        assert_eq!(bundle.run_deferred(), 1);
        assert!(recorded.lock().outcome.clone().unwrap().is_ok());
        assert_eq!(bundle.run_deferred(), 0);
    }

    #[test]
    fn test_dropped_job_abandons_responder() {
        let recorded = Arc::new(Mutex::new(Recorded::default()));
        {
            let bundle = MemoryBundle::deferred("main");
            bundle.load(&urls(&["a.png"]), AssetKind::of::<Sprite>(), responder(&recorded));
        }
        assert!(recorded.lock().abandoned);
    }

    #[test]
    fn test_update_drops_released_handles() {
        let bundle = MemoryBundle::new("main");
        bundle.insert("a.png", Sprite(1));
        let recorded = Arc::new(Mutex::new(Recorded::default()));
        bundle.load(&urls(&["a.png"]), AssetKind::of::<Sprite>(), responder(&recorded));
        let handle = recorded.lock().outcome.clone().unwrap().unwrap().remove(0);

        handle.add_ref();
        assert_eq!(bundle.update(), 0);
        handle.dec_ref();
        assert_eq!(bundle.update(), 1);
        assert!(!bundle.is_live("a.png"));
    }

    #[test]
    fn test_stale_clone_does_not_unload_new_handle() {
        let bundle = MemoryBundle::new("main");
        bundle.insert("a.png", Sprite(1));
        let first = Arc::new(Mutex::new(Recorded::default()));
        bundle.load(&urls(&["a.png"]), AssetKind::of::<Sprite>(), responder(&first));
        let stale = first.lock().outcome.clone().unwrap().unwrap().remove(0);
        stale.add_ref();
        stale.dec_ref();
        assert_eq!(bundle.update(), 1);

        let second = Arc::new(Mutex::new(Recorded::default()));
        bundle.load(&urls(&["a.png"]), AssetKind::of::<Sprite>(), responder(&second));
        let fresh = second.lock().outcome.clone().unwrap().unwrap().remove(0);
        assert_ne!(stale.id(), fresh.id());
        assert_eq!(fresh.ref_count(), 0);

        stale.add_ref();
        stale.dec_ref();
        assert_eq!(bundle.update(), 0);
        assert!(bundle.is_live("a.png"));
    }

    #[test]
    fn test_threadpool_completes_elsewhere() {
        let thread_pool = Arc::new(rayon::ThreadPoolBuilder::new().num_threads(1).build().unwrap());
        let bundle = MemoryBundle::with_threadpool("main", thread_pool);
        bundle.insert("a.png", Sprite(1));
        let (sender, receiver) = flume::bounded(1);

        bundle.load(
            &urls(&["a.png"]),
            AssetKind::of::<Sprite>(),
            LoadResponder::new(
                |_, _| {},
                move |outcome| {
                    let _ = sender.send(outcome.map(|result| result.is_ok()));
                },
            ),
        );

        assert_eq!(receiver.recv().unwrap(), Some(true));
    }

    #[test]
    fn test_preload_describes_items() {
        let bundle = MemoryBundle::new("main");
        let uuid = bundle.insert("sprites/x.png", Sprite(1));
        bundle.insert_scene("level.scene", SceneAsset::default());
        let (sender, receiver) = flume::unbounded();

        let dir_sender = sender.clone();
        bundle.preload_dir(
            "sprites",
            PreloadResponder::new(move |outcome| {
                let _ = dir_sender.send(outcome.unwrap().unwrap());
            }),
        );
        let scene_sender = sender.clone();
        bundle.preload_scene(
            "sprites/x.png",
            PreloadResponder::new(move |outcome| {
                let _ = scene_sender.send(outcome.unwrap().unwrap_or_default());
            }),
        );

        let items = receiver.recv().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].uuid, uuid);
        assert_eq!(items[0].kind, "Sprite");
        assert!(receiver.recv().unwrap().is_empty());
        assert!(!bundle.is_live("sprites/x.png"));
    }
}

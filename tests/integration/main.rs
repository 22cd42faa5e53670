//! Integration tests for imcache

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::fs::{self, File, FileTimes};
    use std::path::{Path, PathBuf};
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    /// Isolated cache directory, disk root and config file
    struct Env {
        _temp: TempDir,
        cache: PathBuf,
        disk: PathBuf,
        config: PathBuf,
    }

    impl Env {
        fn new() -> Self {
            let temp = TempDir::new().unwrap();
            let cache = temp.path().join("cache");
            let disk = temp.path().join("disk");
            fs::create_dir_all(&disk).unwrap();
            let config = temp.path().join("config.toml");
            fs::write(
                &config,
                format!(
                    "[cache]\npath = {:?}\nmax_size = 1000\n\n[disks.archive]\ndriver = \"local\"\nroot = {:?}\n",
                    cache.display().to_string(),
                    disk.display().to_string()
                ),
            )
            .unwrap();
            Self {
                _temp: temp,
                cache,
                disk,
                config,
            }
        }

        fn cmd(&self) -> Command {
            let mut cmd = imcache();
            cmd.arg("--config").arg(&self.config).env_remove("IMCACHE_CONFIG");
            cmd
        }

        fn cached(&self, name: &str, len: usize, secs: u64) {
            fs::create_dir_all(&self.cache).unwrap();
            let path = self.cache.join(name);
            fs::write(&path, vec![0u8; len]).unwrap();
            let t = SystemTime::UNIX_EPOCH + Duration::from_secs(secs);
            File::options()
                .write(true)
                .open(&path)
                .unwrap()
                .set_times(FileTimes::new().set_accessed(t).set_modified(t))
                .unwrap();
        }

        fn cache_names(&self) -> Vec<String> {
            names(&self.cache)
        }
    }

    fn names(dir: &Path) -> Vec<String> {
        let Ok(read) = fs::read_dir(dir) else {
            return Vec::new();
        };
        let mut names: Vec<String> = read
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    fn imcache() -> Command {
        cargo_bin_cmd!("imcache")
    }

    #[test]
    fn help_displays() {
        imcache()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("Disk-backed image cache"));
    }

    #[test]
    fn version_displays() {
        imcache()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("imcache"));
    }

    #[test]
    fn config_path_honors_flag() {
        let env = Env::new();
        env.cmd()
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        let env = Env::new();
        env.cmd()
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[cache]").and(predicate::str::contains("archive")));
    }

    #[test]
    fn config_init_repairs_broken_file() {
        let env = Env::new();
        fs::write(&env.config, "[cache\n").unwrap();

        env.cmd().args(["list"]).assert().failure().stderr(
            predicate::str::contains("Invalid configuration").and(predicate::str::contains("Hint:")),
        );

        env.cmd()
            .args(["config", "init", "--force"])
            .assert()
            .success();
        let content = fs::read_to_string(&env.config).unwrap();
        assert!(content.contains("[cache]"));
    }

    #[test]
    fn list_empty() {
        let env = Env::new();
        env.cmd()
            .args(["list", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"images\": []"));
    }

    #[test]
    fn list_plain_in_access_order() {
        let env = Env::new();
        env.cached("new", 10, 3_000);
        env.cached("old", 10, 1_000);

        env.cmd()
            .args(["list", "--format", "plain"])
            .assert()
            .success()
            .stdout("old\nnew\n");
    }

    #[test]
    fn fetch_local_image_reads_in_place() {
        let env = Env::new();
        let image = env.disk.join("local.jpg");
        fs::write(&image, b"local bytes").unwrap();

        env.cmd()
            .args(["fetch", "7", image.to_str().unwrap(), "--origin", "local"])
            .assert()
            .success()
            .stdout(predicate::str::contains(image.to_str().unwrap()));

        assert!(env.cache_names().is_empty());
    }

    #[test]
    fn fetch_from_local_disk_reads_in_place() {
        let env = Env::new();
        fs::create_dir_all(env.disk.join("2024")).unwrap();
        fs::write(env.disk.join("2024/a.jpg"), b"disk bytes").unwrap();

        env.cmd()
            .args(["fetch", "8", "archive://2024/a.jpg", "--origin", "disk"])
            .assert()
            .success()
            .stdout(predicate::str::contains("a.jpg"));

        assert!(env.cache_names().is_empty());
    }

    #[test]
    fn fetch_once_keeps_in_place_image() {
        let env = Env::new();
        fs::write(env.disk.join("e.jpg"), b"disk bytes").unwrap();

        env.cmd()
            .args(["fetch", "10", "archive://e.jpg", "--origin", "disk", "--once"])
            .assert()
            .success()
            .stdout(predicate::str::contains("e.jpg"));

        assert!(env.disk.join("e.jpg").exists());
    }

    #[test]
    fn fetch_unknown_disk_fails() {
        let env = Env::new();
        env.cmd()
            .args(["fetch", "1", "nowhere://a.jpg", "--origin", "disk"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("not available"));

        assert!(env.cache_names().is_empty());
    }

    #[test]
    fn fetch_rejects_path_like_id() {
        let env = Env::new();
        env.cmd()
            .args(["fetch", "../x", "https://example.org/x.jpg"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid image id"));
    }

    #[test]
    fn cat_streams_disk_image() {
        let env = Env::new();
        fs::write(env.disk.join("b.png"), b"png bytes").unwrap();

        env.cmd()
            .args(["cat", "9", "archive://b.png", "--origin", "disk"])
            .assert()
            .success()
            .stdout("png bytes");
    }

    #[test]
    fn warm_reports_failures_without_failing() {
        let env = Env::new();
        fs::write(env.disk.join("c.jpg"), b"c").unwrap();
        let manifest = env.disk.join("manifest.csv");
        fs::write(
            &manifest,
            "# id,origin,location\n1,disk,archive://c.jpg\n2,disk,nowhere://d.jpg\nbroken\n",
        )
        .unwrap();

        env.cmd()
            .arg("warm")
            .arg(&manifest)
            .assert()
            .success()
            .stdout(predicate::str::contains("Warmed 1 image(s), 2 failed"));
    }

    #[test]
    fn prune_evicts_oldest_first() {
        let env = Env::new();
        env.cached("t1", 40, 1_000);
        env.cached("t2", 40, 2_000);
        env.cached("t3", 40, 3_000);

        env.cmd()
            .args(["prune", "--max-size", "100"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Evicted 1 image(s)"));

        assert_eq!(env.cache_names(), vec!["t2", "t3"]);
    }

    #[test]
    fn prune_uses_configured_budget() {
        let env = Env::new();
        env.cached("a", 600, 1_000);
        env.cached("b", 600, 2_000);

        env.cmd().arg("prune").assert().success();

        assert_eq!(env.cache_names(), vec!["b"]);
    }

    #[test]
    fn clear_requires_confirmation() {
        let env = Env::new();
        env.cached("a", 10, 1_000);
        env.cached(".b.4242-0.part", 4, 1_000);

        env.cmd().arg("clear").assert().success();
        assert_eq!(env.cache_names(), vec![".b.4242-0.part", "a"]);

        env.cmd().args(["clear", "--yes"]).assert().success();
        assert!(env.cache_names().is_empty());
    }

    #[test]
    fn watch_rejects_zero_interval() {
        let env = Env::new();
        env.cmd()
            .args(["watch", "--interval", "0"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("at least 1 second"));
    }
}

mod concurrency_tests {
    use imcache::cache::{ImageCache, ImageDescriptor, MAX_ATTEMPTS};
    use imcache::config::CacheConfig;
    use imcache::storage::{ByteStream, StorageBackend, StorageRegistry};
    use std::fs;
    use std::io::{self, Read};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};
    use std::thread;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Backend that serves a payload in small, slow chunks
    ///
    /// The first `failing_opens` streams break off after one chunk.
    struct SlowBackend {
        payload: Vec<u8>,
        opens: AtomicUsize,
        failing_opens: usize,
    }

    struct SlowReader {
        data: Vec<u8>,
        pos: usize,
        fail: bool,
    }

    impl Read for SlowReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.pos >= self.data.len() {
                return Ok(0);
            }
            thread::sleep(Duration::from_millis(5));
            if self.fail && self.pos > 0 {
                thread::sleep(Duration::from_millis(40));
                return Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset"));
            }
            let n = buf.len().min(16).min(self.data.len() - self.pos);
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    impl StorageBackend for SlowBackend {
        fn open(&self, _path: &str) -> io::Result<ByteStream> {
            let n = self.opens.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(SlowReader {
                data: self.payload.clone(),
                pos: 0,
                fail: n < self.failing_opens,
            }))
        }

        fn kind(&self) -> &'static str {
            "slow"
        }
    }

    fn setup(payload: &[u8]) -> (TempDir, ImageCache, Arc<SlowBackend>) {
        setup_failing(payload, 0)
    }

    fn setup_failing(
        payload: &[u8],
        failing_opens: usize,
    ) -> (TempDir, ImageCache, Arc<SlowBackend>) {
        let temp = TempDir::new().unwrap();
        let backend = Arc::new(SlowBackend {
            payload: payload.to_vec(),
            opens: AtomicUsize::new(0),
            failing_opens,
        });
        let config = CacheConfig {
            path: temp.path().join("cache"),
            ..Default::default()
        };
        let storage = StorageRegistry::new().with_disk("slow", backend.clone());
        (temp, ImageCache::new(&config, storage), backend)
    }

    #[test]
    fn concurrent_acquire_fetches_once() {
        let payload: Vec<u8> = (0..=255u8).cycle().take(512).collect();
        let (_temp, cache, backend) = setup(&payload);
        let image = ImageDescriptor::disk(1u64, "slow://a.jpg");

        let workers = 6;
        let barrier = Arc::new(Barrier::new(workers));
        let handles: Vec<_> = (0..workers)
            .map(|_| {
                let cache = cache.clone();
                let image = image.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    cache
                        .with_image(&image, |_, path| fs::read(path).unwrap())
                        .unwrap()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), payload);
        }
        assert_eq!(backend.opens.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn waiter_refetches_after_failed_writer() {
        let payload: Vec<u8> = (0..=255u8).cycle().take(256).collect();
        let (_temp, cache, backend) = setup_failing(&payload, MAX_ATTEMPTS as usize);
        let image = ImageDescriptor::disk(5u64, "slow://e.jpg");
        let cached_path = cache.dir().cached_path(&image.id).unwrap();

        let writer = {
            let cache = cache.clone();
            let image = image.clone();
            thread::spawn(move || cache.acquire(&image).is_ok())
        };

        // Join the writer while it still holds the exclusive lock
        while !cached_path.exists() {
            thread::sleep(Duration::from_millis(1));
        }
        let seen = cache
            .with_image(&image, |_, path| fs::read(path).unwrap())
            .unwrap();

        assert!(!writer.join().unwrap());
        assert_eq!(seen, payload);
        assert_eq!(
            backend.opens.load(Ordering::SeqCst),
            MAX_ATTEMPTS as usize + 1
        );
    }

    #[test]
    fn use_once_respects_concurrent_reader() {
        let (_temp, cache, backend) = setup(b"image bytes");
        let image = ImageDescriptor::disk(2u64, "slow://b.jpg");

        let reader = cache.acquire(&image).unwrap();
        let cached_path = reader.path().to_path_buf();

        let seen = cache
            .with_image_once(&image, |_, path| fs::read(path).unwrap())
            .unwrap();
        assert_eq!(seen, b"image bytes");
        assert!(cached_path.exists());

        cache.release(reader, false);
        cache
            .with_image_once(&image, |_, path| path.to_path_buf())
            .unwrap();
        assert!(!cached_path.exists());
        assert_eq!(backend.opens.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn prune_never_deletes_file_being_read() {
        let (_temp, cache, _backend) = setup(&[7u8; 64]);
        let first = ImageDescriptor::disk(3u64, "slow://c.jpg");
        let second = ImageDescriptor::disk(4u64, "slow://d.jpg");

        let reader = cache.acquire(&first).unwrap();
        cache.with_image(&second, |_, _| ()).unwrap();

        let report = cache.prune_to(0).unwrap();

        assert_eq!(report.deleted, 1);
        assert_eq!(report.skipped, 1);
        assert!(reader.path().exists());
        assert_eq!(fs::read(reader.path()).unwrap(), vec![7u8; 64]);
    }
}

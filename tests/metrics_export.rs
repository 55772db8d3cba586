// tests/metrics_export.rs

use std::sync::Arc;

use prometheus::core::Collector;
use prometheus::Registry;

use watchpool::metrics::{encode_text, summarize_workers, Counters, Informer, StatsExporter};
use watchpool::pool::{WorkerState, WorkerStatus};

struct StaticWorkers(Vec<WorkerState>);

impl Informer for StaticWorkers {
    fn workers(&self) -> Vec<WorkerState> {
        self.0.clone()
    }
}

fn worker(pid: u32, status: WorkerStatus, memory_usage: u64) -> WorkerState {
    WorkerState {
        pid,
        status,
        num_execs: 0,
        memory_usage,
    }
}

#[test]
fn summary_buckets_statuses() {
    let summary = summarize_workers(&[
        worker(1, WorkerStatus::Ready, 100),
        worker(2, WorkerStatus::Working, 200),
        worker(3, WorkerStatus::Errored, 300),
        worker(4, WorkerStatus::Stopping, 0),
    ]);

    assert_eq!(summary.total, 4);
    assert_eq!(summary.ready, 1);
    assert_eq!(summary.working, 1);
    assert_eq!(summary.invalid, 2);
    assert_eq!(summary.memory_bytes, 600);
}

#[test]
fn exporter_reads_counters_at_scrape_time() {
    let counters = Arc::new(Counters::new());
    let informer = Arc::new(StaticWorkers(vec![
        worker(11, WorkerStatus::Ready, 4096),
        worker(12, WorkerStatus::Working, 1024),
    ]));
    let registry = Registry::new();
    registry
        .register(Box::new(
            StatsExporter::new(Arc::clone(&counters), informer).unwrap(),
        ))
        .unwrap();

    counters.count_event();
    counters.count_job_ok();
    counters.count_event();
    counters.count_job_err();

    let text = encode_text(&registry).unwrap();

    assert!(text.contains("rr_file_watch_events 2"), "{text}");
    assert!(text.contains("rr_file_watch_jobs_ok 1"), "{text}");
    assert!(text.contains("rr_file_watch_jobs_err 1"), "{text}");
    assert!(text.contains("rr_file_watch_total_workers 2"), "{text}");
    assert!(text.contains("rr_file_watch_workers_memory_bytes 5120"), "{text}");
    assert!(text.contains("rr_file_watch_workers_working 1"), "{text}");
    assert!(text.contains("rr_file_watch_workers_invalid 0"), "{text}");
    assert!(text.contains(r#"rr_file_watch_worker_memory_bytes{pid="11"} 4096"#), "{text}");
}

#[test]
fn exporter_describes_every_metric() {
    let exporter = StatsExporter::new(
        Arc::new(Counters::new()),
        Arc::new(StaticWorkers(Vec::new())),
    )
    .unwrap();

    let names: Vec<String> = exporter
        .desc()
        .iter()
        .map(|d| d.fq_name.clone())
        .collect();

    assert_eq!(names.len(), 10);
    assert!(names.iter().all(|n| n.starts_with("rr_file_watch_")));
    assert!(names.contains(&"rr_file_watch_worker_state".to_string()));
}

#[test]
fn snapshot_serializes_counters() {
    let counters = Counters::new();
    counters.count_event();
    counters.count_job_ok();

    let json = serde_json::to_value(counters.snapshot()).unwrap();

    assert_eq!(json["events"], 1);
    assert_eq!(json["jobs_ok"], 1);
    assert_eq!(json["jobs_err"], 0);
}

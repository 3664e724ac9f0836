use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Counters shared by scans and world caches, usually behind an `Arc`.
#[derive(Debug, Default)]
pub struct ScanMetrics {
    // Scan
    pub regions_scanned: AtomicUsize,
    pub regions_skipped: AtomicUsize,
    pub chunks_scanned: AtomicUsize,
    pub total_region_read_us: AtomicU64,
    pub max_region_read_us: AtomicU64,

    // Chunk decoding
    pub chunks_decoded: AtomicUsize,
    pub chunks_invalid: AtomicUsize,
    pub total_decode_us: AtomicU64,

    // Cache
    pub region_cache_hits: AtomicUsize,
    pub region_cache_misses: AtomicUsize,
    pub chunk_cache_hits: AtomicUsize,
    pub chunk_cache_misses: AtomicUsize,

    // Session
    pub start_time: Option<Instant>,
    pub config_summary: String,
}

fn ratio(part: usize, total: usize) -> f64 {
    if total > 0 { part as f64 / total as f64 * 100.0 } else { 0.0 }
}

fn avg_ms(total_us: u64, count: usize) -> f64 {
    if count > 0 { total_us as f64 / 1000.0 / count as f64 } else { 0.0 }
}

impl ScanMetrics {
    pub fn new(config_summary: String) -> Self {
        Self {
            start_time: Some(Instant::now()),
            config_summary,
            ..Default::default()
        }
    }

    pub fn record_region_read(&self, duration: Duration, chunks: usize) {
        self.regions_scanned.fetch_add(1, Ordering::Relaxed);
        self.chunks_scanned.fetch_add(chunks, Ordering::Relaxed);
        let us = duration.as_micros() as u64;
        self.total_region_read_us.fetch_add(us, Ordering::Relaxed);
        self.max_region_read_us.fetch_max(us, Ordering::Relaxed);
    }

    pub fn record_region_skipped(&self) {
        self.regions_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_chunk_decode(&self, duration: Duration, valid: bool) {
        self.chunks_decoded.fetch_add(1, Ordering::Relaxed);
        if !valid {
            self.chunks_invalid.fetch_add(1, Ordering::Relaxed);
        }
        self.total_decode_us.fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn record_region_cache(&self, hit: bool) {
        let counter = if hit { &self.region_cache_hits } else { &self.region_cache_misses };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_chunk_cache(&self, hit: bool) {
        let counter = if hit { &self.chunk_cache_hits } else { &self.chunk_cache_misses };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn generate_report(&self) -> String {
        let uptime = self.start_time.unwrap_or_else(Instant::now).elapsed();

        let regions = self.regions_scanned.load(Ordering::Relaxed);
        let skipped = self.regions_skipped.load(Ordering::Relaxed);
        let chunks = self.chunks_scanned.load(Ordering::Relaxed);
        let read_avg = avg_ms(self.total_region_read_us.load(Ordering::Relaxed), regions);
        let read_max = self.max_region_read_us.load(Ordering::Relaxed) as f64 / 1000.0;

        let decoded = self.chunks_decoded.load(Ordering::Relaxed);
        let invalid = self.chunks_invalid.load(Ordering::Relaxed);
        let decode_avg = avg_ms(self.total_decode_us.load(Ordering::Relaxed), decoded);

        let region_hits = self.region_cache_hits.load(Ordering::Relaxed);
        let region_misses = self.region_cache_misses.load(Ordering::Relaxed);
        let chunk_hits = self.chunk_cache_hits.load(Ordering::Relaxed);
        let chunk_misses = self.chunk_cache_misses.load(Ordering::Relaxed);

        format!(
            "Tilecraft Scan Report\n\
             =====================\n\
             Configuration: {}\n\
             Session Duration: {:.2?}\n\n\
             [Scan]\n\
             Regions Scanned: {}\n\
             Regions Skipped: {}\n\
             Chunks Found: {}\n\
             Avg Region Read: {:.2} ms\n\
             Max Region Read: {:.2} ms\n\n\
             [Chunks]\n\
             Decoded: {}\n\
             Invalid: {}\n\
             Avg Decode: {:.2} ms/chunk\n\n\
             [Cache]\n\
             Region Hits: {} / Misses: {} ({:.1}% hit rate)\n\
             Chunk Hits: {} / Misses: {} ({:.1}% hit rate)\n",
            self.config_summary,
            uptime,
            regions, skipped, chunks, read_avg, read_max,
            decoded, invalid, decode_avg,
            region_hits, region_misses, ratio(region_hits, region_hits + region_misses),
            chunk_hits, chunk_misses, ratio(chunk_hits, chunk_hits + chunk_misses),
        )
    }
}

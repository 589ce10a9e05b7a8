//! `literoom` — batch CLI front-end for the Literoom edit engine.
//!
//! Scans a folder into the catalog, then exports every (or every
//! flagged) asset through the full deterministic adjustment/tone-curve/
//! mask/histogram pipeline at full quality.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use rayon::prelude::*;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use literoom_core::catalog::{Catalog, LocalDirectoryHandle};
use literoom_core::decode;
use literoom_core::executor::{CancellationToken, Executor, Quality};
use literoom_core::export::{self, ExportQuality, ResizePreset, TemplateContext, DEFAULT_TEMPLATE};
use literoom_core::model::{AssetFormat, Flag};

#[derive(Parser, Debug)]
#[command(author, version, about = "Non-destructive ARW/JPEG culling and export engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Recursively scan a directory and persist discovered assets to the
    /// catalog store.
    Scan {
        /// Directory to scan.
        dir: PathBuf,
        /// Path to the catalog store file (created if missing).
        #[arg(long, default_value = "literoom-catalog.json")]
        store: PathBuf,
    },
    /// Render every cataloged asset (or only `pick`-flagged ones) through
    /// the full pipeline and write JPEGs to `output`.
    Export {
        /// Path to the catalog store file populated by `scan`.
        #[arg(long, default_value = "literoom-catalog.json")]
        store: PathBuf,
        /// Destination directory for exported JPEGs.
        #[arg(short, long)]
        output: PathBuf,
        /// Only export assets flagged `pick`.
        #[arg(long)]
        picks_only: bool,
        /// Filename template; supports the `{orig}`, `{seq:N}`, and
        /// `{date}` tokens.
        #[arg(long, default_value = DEFAULT_TEMPLATE)]
        template: String,
        /// Long-edge resize preset.
        #[arg(long, value_enum, default_value = "original")]
        preset: PresetArg,
        /// JPEG quality, 1-100.
        #[arg(long, default_value_t = 90)]
        quality: u8,
        /// First sequence number used by `{seq:N}`.
        #[arg(long, default_value_t = 1)]
        start_seq: u32,
    },
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum PresetArg {
    Original,
    #[value(name = "2048")]
    Edge2048,
    #[value(name = "3840")]
    Edge3840,
    #[value(name = "5120")]
    Edge5120,
}

impl From<PresetArg> for ResizePreset {
    fn from(arg: PresetArg) -> Self {
        match arg {
            PresetArg::Original => ResizePreset::Original,
            PresetArg::Edge2048 => ResizePreset::Edge2048,
            PresetArg::Edge3840 => ResizePreset::Edge3840,
            PresetArg::Edge5120 => ResizePreset::Edge5120,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init();

    let cli = Cli::parse();
    match cli.command {
        Command::Scan { dir, store } => run_scan(&dir, &store),
        Command::Export {
            store,
            output,
            picks_only,
            template,
            preset,
            quality,
            start_seq,
        } => run_export(&store, &output, picks_only, &template, preset.into(), quality, start_seq),
    }
}

fn run_scan(dir: &std::path::Path, store_path: &std::path::Path) -> anyhow::Result<()> {
    let mut catalog = Catalog::open(store_path)?;
    let handle = LocalDirectoryHandle::new(dir);
    let cancellation = CancellationToken::new();
    let total = catalog.scan(&handle, &cancellation)?;
    info!(total, dir = %dir.display(), "scan complete");
    Ok(())
}

fn run_export(
    store_path: &std::path::Path,
    output: &std::path::Path,
    picks_only: bool,
    template: &str,
    preset: ResizePreset,
    quality: u8,
    start_seq: u32,
) -> anyhow::Result<()> {
    let catalog = Catalog::open(store_path)?;
    std::fs::create_dir_all(output)?;

    let mut assets: Vec<_> = catalog
        .assets()
        .filter(|a| !picks_only || a.flag == Flag::Pick)
        .cloned()
        .collect();
    assets.sort_by(|a, b| a.path.cmp(&b.path));

    if assets.is_empty() {
        warn!("no assets matched the export filter; nothing to do");
        return Ok(());
    }

    let executor = Arc::new(Executor::new());
    let export_quality = ExportQuality::new(quality);
    let written = std::sync::Mutex::new(std::collections::HashSet::<String>::new());

    let results: Vec<_> = assets
        .par_iter()
        .enumerate()
        .map(|(i, asset)| {
            let seq = start_seq + i as u32;
            let result = (|| -> anyhow::Result<PathBuf> {
                let edit_state = catalog.edit_state(&asset.id);
                edit_state.validate()?;

                let bytes = std::fs::read(&asset.path)?;
                let decoded = match asset.format {
                    AssetFormat::Jpeg => decode::decode_jpeg(&bytes)?,
                    AssetFormat::Raw => decode::decode_raw_full(&bytes)
                        .or_else(|_| decode::decode_raw_thumbnail(&bytes))?,
                };

                let cancellation = CancellationToken::new();
                let (render_output, _backend) =
                    executor.render(&decoded, &edit_state, Quality::Full, &cancellation)?;

                let orig_stem = std::path::Path::new(&asset.filename)
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| asset.filename.clone());
                let date = capture_date(asset.captured_at);
                let stem = export::render_filename(
                    template,
                    &TemplateContext {
                        orig: &orig_stem,
                        seq,
                        date: &date,
                    },
                )?;

                let handle = LocalDirectoryHandle::new(output);
                let path = export::export(
                    &handle,
                    output,
                    &stem,
                    &render_output.image,
                    preset,
                    export_quality,
                    |candidate| {
                        let mut guard = written.lock().expect("export name set mutex poisoned");
                        if guard.contains(candidate) {
                            true
                        } else {
                            output.join(candidate).exists()
                        }
                    },
                )?;
                written
                    .lock()
                    .expect("export name set mutex poisoned")
                    .insert(path.file_name().unwrap().to_string_lossy().into_owned());
                Ok(path)
            })();

            if let Err(err) = &result {
                error!(asset = %asset.path, error = %err, "export failed");
            }
            result
        })
        .collect();

    let ok = results.iter().filter(|r| r.is_ok()).count();
    info!(total = assets.len(), exported = ok, "export complete");
    Ok(())
}

/// ISO `YYYY-MM-DD` from a capture timestamp, falling back to the Unix
/// epoch when absent — used to fill the `{date}` export token.
fn capture_date(captured_at: Option<i64>) -> String {
    const SECONDS_PER_DAY: i64 = 86_400;
    let days_since_epoch = captured_at.unwrap_or(0).div_euclid(SECONDS_PER_DAY);
    civil_date_from_days(days_since_epoch)
}

/// Converts a day count since the Unix epoch into a `YYYY-MM-DD` string
/// using Howard Hinnant's `civil_from_days` algorithm, avoiding a chrono
/// dependency for a single date-formatting call.
fn civil_date_from_days(z: i64) -> String {
    let z = z + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = (z - era * 146_097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = if m <= 2 { y + 1 } else { y };
    format!("{y:04}-{m:02}-{d:02}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_date_is_1970_01_01() {
        assert_eq!(capture_date(Some(0)), "1970-01-01");
    }

    #[test]
    fn known_timestamp_formats_correctly() {
        // 2024-06-15T00:00:00Z
        assert_eq!(capture_date(Some(1_718_409_600)), "2024-06-15");
    }
}

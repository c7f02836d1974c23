//! CLI driving the uplink C ABI end to end against the in-memory backend.
//!
//! Pipeline: parse grant -> open project -> upload in chunks -> commit ->
//! stat -> download and verify -> list -> report.

mod abi;
mod report;

use abi::{Access, Project};
use bridge_provider::{MemoryUplink, Uplink};
use clap::{Parser, Subcommand};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

#[derive(Parser, Debug)]
#[command(name = "uplink-bridge", version, about = "Exercise the uplink C ABI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Upload an object, read it back, and list its bucket.
    Roundtrip {
        /// Serialized access grant; a local one is generated when absent.
        #[arg(long, env = "UPLINK_ACCESS")]
        access: Option<String>,

        #[arg(long, default_value = "demo")]
        bucket: String,

        #[arg(long, default_value = "roundtrip.bin")]
        key: String,

        /// Upload this many generated bytes.
        #[arg(long, default_value_t = 1 << 20, conflicts_with = "file")]
        size: usize,

        /// Upload the contents of this file instead.
        #[arg(long)]
        file: Option<std::path::PathBuf>,

        /// Bytes handed to each write call.
        #[arg(long, default_value_t = 32 * 1024)]
        chunk: usize,

        /// Segment-upload scheduler width.
        #[arg(long, env = "UPLINK_MAX_CONCURRENT")]
        max_concurrent: Option<i32>,

        /// Expire the object this many seconds from now.
        #[arg(long)]
        expires_in: Option<u64>,

        /// Delete the object afterwards.
        #[arg(long, default_value_t = false)]
        cleanup: bool,

        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Print a serialized access grant for the in-memory backend.
    Grant {
        #[arg(long, default_value = "memory://local")]
        satellite: String,

        #[arg(long, default_value = "local-key")]
        api_key: String,

        #[arg(long, default_value = "local")]
        project: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Grant {
            satellite,
            api_key,
            project,
        } => {
            let access = bridge_provider::Access::new(satellite, api_key, project);
            println!("{}", MemoryUplink::new().serialize_access(&access)?);
        }
        Commands::Roundtrip {
            access,
            bucket,
            key,
            size,
            file,
            chunk,
            max_concurrent,
            expires_in,
            cleanup,
            json,
        } => {
            let grant = match access {
                Some(grant) => grant,
                None => MemoryUplink::new().serialize_access(&bridge_provider::Access::new(
                    "memory://local",
                    "local-key",
                    "local",
                ))?,
            };
            let data = match file {
                Some(path) => std::fs::read(&path)?,
                None => (0..size).map(|i| (i % 251) as u8).collect(),
            };
            let expires = match expires_in {
                Some(secs) => {
                    let at = SystemTime::now().duration_since(UNIX_EPOCH)? + Duration::from_secs(secs);
                    i64::try_from(at.as_secs())?
                }
                None => 0,
            };

            // 1. Open.
            let access = Access::parse(&grant)?;
            let satellite = access.satellite_address()?;
            let project = Project::open(&access, max_concurrent)?;
            project.ensure_bucket(&bucket)?;
            tracing::info!(%satellite, %bucket, %key, bytes = data.len(), "starting round trip");

            // 2. Upload.
            let t0 = Instant::now();
            let upload = project.upload(&bucket, &key, expires)?;
            let mut write_calls = 0;
            for piece in data.chunks(chunk.max(1)) {
                let written = upload.write(piece)?;
                write_calls += 1;
                tracing::trace!(written, "chunk written");
            }
            upload.commit()?;
            let committed = upload.info()?;
            drop(upload);
            let t_upload = t0.elapsed();
            tracing::info!(
                bytes = committed.content_length,
                elapsed_ms = t_upload.as_millis(),
                mib_per_sec = report::Report::throughput(data.len(), t_upload),
                "upload committed"
            );

            // 3. Verify.
            let t1 = Instant::now();
            let object = project.stat(&bucket, &key)?;
            let downloaded = project.download(&bucket, &key)?.read_to_end(chunk)?;
            let t_download = t1.elapsed();
            let verified = downloaded == data;
            if !verified {
                tracing::warn!(
                    expected = data.len(),
                    got = downloaded.len(),
                    "downloaded bytes differ"
                );
            }

            // 4. List.
            let listing = project.list(&bucket, "", false)?;

            if cleanup {
                project.delete(&bucket, &key)?;
                tracing::info!(%bucket, %key, "object deleted");
            }
            project.close()?;

            let report = report::Report {
                satellite,
                bucket,
                key,
                bytes: data.len(),
                write_calls,
                verified,
                upload_ms: t_upload.as_millis(),
                download_ms: t_download.as_millis(),
                object,
                listing,
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", report.render());
            }
            if !verified {
                return Err("round trip verification failed".into());
            }
        }
    }

    Ok(())
}

use std::collections::HashSet;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use log::{error, info, warn};
use reqwest::Client;
use tokio::time::sleep;

use captionscan::hls::{HlsClient, MediaPlaylist, PlaylistType};
use captionscan::mpeg_ts::demux_segment;
use captionscan::{create_parser, CaptionBlock, PictureType};

#[derive(Parser)]
#[command(name = "captionscan")]
#[command(about = "Extract closed caption data from HLS streams and MPEG-TS files")]
struct Args {
    #[arg(help = "HLS playlist URL or path to a local .ts file")]
    input: String,

    #[arg(long, help = "Stop after this many segments (VOD only)")]
    max_segments: Option<usize>,

    #[arg(long, help = "Print every caption block instead of a per-segment summary")]
    dump: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();

    if args.input.starts_with("http://") || args.input.starts_with("https://") {
        info!("Starting caption scan for: {}", args.input);
        let hls = HlsClient::new(Client::new());
        let playlist = hls.media_playlist(&args.input).await?;

        match playlist.kind.clone() {
            PlaylistType::Live { target_duration } => {
                info!("Detected live playlist with target duration: {}s", target_duration);
                process_live_playlist(&hls, &args, target_duration).await?;
            }
            PlaylistType::Vod => {
                info!("Detected VOD playlist");
                process_vod_playlist(&hls, &args, playlist).await?;
            }
        }
    } else {
        let data = tokio::fs::read(&args.input).await?;
        let captions = scan_segment(&data)?;
        print_captions(&args.input, &captions, args.dump);
        println!("{} caption blocks found", captions.len());
    }

    Ok(())
}

fn scan_segment(data: &[u8]) -> Result<Vec<CaptionBlock>> {
    let segment = demux_segment(data)?;
    let mut parser = create_parser(segment.codec, None);
    let mut captions = Vec::new();
    let mut invalid = 0;

    for unit in &segment.units {
        if parser.parse(&unit.access_unit(), &mut captions) == PictureType::Invalid {
            invalid += 1;
        }
    }
    parser.flush(&mut captions);

    if invalid > 0 {
        warn!(
            "{} of {} access units were corrupt",
            invalid,
            segment.units.len()
        );
    }

    Ok(captions)
}

fn print_captions(name: &str, captions: &[CaptionBlock], dump: bool) {
    if captions.is_empty() {
        return;
    }

    println!("Segment: {}", name);
    if dump {
        for block in captions {
            let triplets: Vec<String> = block
                .triplets()
                .map(|t| format!("{:02x}{:02x}{:02x}", t[0], t[1], t[2]))
                .collect();
            println!("  {:>10.3}  {}", block.pts, triplets.join(" "));
        }
    } else {
        let triplets: usize = captions.iter().map(|b| b.data.len() / 3).sum();
        println!("  {} caption blocks, {} triplets", captions.len(), triplets);
    }
}

async fn process_segment(hls: &HlsClient, uri: &str, dump: bool) -> Result<usize> {
    let data = hls.fetch(uri).await?;
    let captions = scan_segment(&data)?;
    print_captions(uri, &captions, dump);
    Ok(captions.len())
}

async fn process_live_playlist(hls: &HlsClient, args: &Args, target_duration: u64) -> Result<()> {
    let mut processed_segments = HashSet::new();
    let poll_interval = Duration::from_secs(target_duration.max(1));

    info!("Starting live playlist polling every {}s", target_duration);

    loop {
        match hls.media_playlist(&args.input).await {
            Ok(playlist) => {
                for segment in playlist.segments {
                    if processed_segments.contains(&segment.uri) {
                        continue;
                    }

                    info!("Processing segment: {}", segment.uri);
                    if let Err(e) = process_segment(hls, &segment.uri, args.dump).await {
                        warn!("Failed to process segment {}: {}", segment.uri, e);
                    }
                    processed_segments.insert(segment.uri);
                }
                info!("Completed live playlist poll cycle");
            }
            Err(e) => {
                error!("Error processing segments: {}", e);
            }
        }

        sleep(poll_interval).await;
    }
}

async fn process_vod_playlist(hls: &HlsClient, args: &Args, playlist: MediaPlaylist) -> Result<()> {
    let total_segments = args
        .max_segments
        .map_or(playlist.segments.len(), |max| max.min(playlist.segments.len()));
    println!("Found {} segments to process", total_segments);

    let mut segments_with_captions = 0;
    let mut total_captions = 0;

    for (index, segment) in playlist.segments.iter().take(total_segments).enumerate() {
        info!(
            "Processing segment {}/{}: {}",
            index + 1,
            total_segments,
            segment.uri
        );

        match process_segment(hls, &segment.uri, args.dump).await {
            Ok(0) => {}
            Ok(count) => {
                segments_with_captions += 1;
                total_captions += count;
            }
            Err(e) => {
                warn!("Failed to process segment {}: {}", segment.uri, e);
            }
        }

        if (index + 1) % 10 == 0 {
            info!(
                "Progress: {}/{} segments processed ({:.1}%)",
                index + 1,
                total_segments,
                ((index + 1) as f64 / total_segments as f64) * 100.0
            );
        }
    }

    println!(
        "Summary: {}/{} segments contained captions ({} caption blocks found)",
        segments_with_captions, total_segments, total_captions
    );
    Ok(())
}

use anyhow::{anyhow, Result};
use bytes::Bytes;
use log::{debug, info};
use m3u8_rs::{MediaPlaylistType, Playlist};
use reqwest::Client;
use url::Url;

// Master playlists may only point at media playlists.
const MAX_PLAYLIST_DEPTH: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub enum PlaylistType {
    Live { target_duration: u64 },
    Vod,
}

#[derive(Debug, Clone)]
pub struct Segment {
    pub uri: String,
    pub duration: f64,
}

#[derive(Debug, Clone)]
pub struct MediaPlaylist {
    pub kind: PlaylistType,
    pub segments: Vec<Segment>,
}

#[derive(Debug)]
pub enum ParsedPlaylist {
    // A master playlist, resolved to its lowest bandwidth variant.
    Master { variant_uri: String },
    Media(MediaPlaylist),
}

pub fn resolve_url(base_url: &str, relative_url: &str) -> Result<String> {
    if relative_url.starts_with("http://") || relative_url.starts_with("https://") {
        return Ok(relative_url.to_string());
    }

    let base = Url::parse(base_url)?;
    let resolved = base.join(relative_url)?;
    Ok(resolved.to_string())
}

pub fn parse_playlist(content: &[u8], base_url: &str) -> Result<ParsedPlaylist> {
    let playlist = m3u8_rs::parse_playlist_res(content)
        .map_err(|e| anyhow!("failed to parse playlist {}: {:?}", base_url, e))?;

    match playlist {
        Playlist::MasterPlaylist(master) => {
            let lowest = master
                .variants
                .iter()
                .filter(|variant| !variant.is_i_frame)
                .min_by_key(|variant| variant.bandwidth)
                .ok_or_else(|| anyhow!("No media playlists found in master playlist"))?;
            info!(
                "Found {} media playlists, lowest bitrate: {}",
                master.variants.len(),
                lowest.bandwidth
            );
            Ok(ParsedPlaylist::Master {
                variant_uri: resolve_url(base_url, &lowest.uri)?,
            })
        }
        Playlist::MediaPlaylist(media) => {
            let kind = if media.end_list
                || matches!(media.playlist_type, Some(MediaPlaylistType::Vod))
            {
                PlaylistType::Vod
            } else {
                PlaylistType::Live {
                    target_duration: media.target_duration as u64,
                }
            };

            let segments = media
                .segments
                .iter()
                .map(|segment| {
                    Ok(Segment {
                        uri: resolve_url(base_url, &segment.uri)?,
                        duration: segment.duration as f64,
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            info!("Found {} segments in media playlist", segments.len());
            Ok(ParsedPlaylist::Media(MediaPlaylist { kind, segments }))
        }
    }
}

pub struct HlsClient {
    client: Client,
}

impl HlsClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    // Fetches `playlist_url`, following a master playlist down to its
    // lowest bandwidth variant.
    pub async fn media_playlist(&self, playlist_url: &str) -> Result<MediaPlaylist> {
        let mut url = playlist_url.to_string();
        for _ in 0..MAX_PLAYLIST_DEPTH {
            let content = self.fetch(&url).await?;
            match parse_playlist(&content, &url)? {
                ParsedPlaylist::Master { variant_uri } => url = variant_uri,
                ParsedPlaylist::Media(media) => return Ok(media),
            }
        }

        Err(anyhow!(
            "Unable to resolve a media playlist from {}",
            playlist_url
        ))
    }

    pub async fn fetch(&self, url: &str) -> Result<Bytes> {
        debug!("Fetching: {}", url);
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.bytes().await?)
    }
}

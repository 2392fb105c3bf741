use thiserror::Error;

/// Failure to turn an `enqueue` request into a playable song.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("no url or title was supplied")]
    EmptyQuery,
    #[error("could not run yt-dlp: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("yt-dlp exited with an error: {0}")]
    Extractor(String),
    #[error("could not parse yt-dlp output: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("yt-dlp returned no result for {0:?}")]
    NotFound(String),
}

/// Failures of the voice connection or the audio player.
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("songbird voice client is not initialised")]
    SongbirdMissing,
    #[error("could not join voice channel: {0}")]
    Join(#[from] songbird::error::JoinError),
    #[error("no active voice call")]
    NoCall,
}

/// Why an `enqueue` request did not add a song.
#[derive(Debug, Error)]
pub enum EnqueueError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error("the requester is not in a voice channel")]
    NotInVoiceChannel,
    #[error(transparent)]
    Playback(#[from] PlaybackError),
}

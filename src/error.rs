use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the converter
#[derive(Error, Debug)]
pub enum ConvertError {
    /// An error originating from the underlying FFmpeg library
    #[error("FFmpeg error: {0}")]
    Ffmpeg(#[from] FfmpegError),

    /// A standard I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A directory could not be read or created while mirroring the tree
    #[error("Cannot access directory {path:?}: {source}")]
    DirectoryAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The source root given on the command line is not a directory
    #[error("Not a directory: {0:?}")]
    NotADirectory(PathBuf),

    /// The source stream reports a zero, negative or unset average bitrate
    #[error("Invalid bit rate: {0}")]
    InvalidBitrate(i64),

    /// A requested stream could not be found in the media file
    #[error("Stream not found: {0}")]
    StreamNotFound(String),

    /// The media file does not contain a decodable audio stream
    #[error("No audio stream found in {0:?}")]
    NoAudioStream(PathBuf),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// FFmpeg-specific errors
#[derive(Error, Debug)]
pub enum FfmpegError {
    /// Failure during global FFmpeg initialization
    #[error("FFmpeg initialization failed: {0}")]
    InitFailed(String),

    /// Failure opening an input media file
    #[error("Failed to open input file: {0}")]
    OpenInput(String),

    /// Failure instantiating a decoder
    #[error("Failed to create decoder: {0}")]
    DecoderCreate(String),

    /// The requested encoder was not found in the linked FFmpeg build
    #[error("Failed to find encoder: {0}")]
    EncoderNotFound(String),

    /// Failure applying configuration parameters to an encoder
    #[error("Failed to configure encoder: {0}")]
    EncoderConfigure(String),

    /// Failure creating an audio resampler
    #[error("Failed to create resampler: {0}")]
    ResamplerCreate(String),

    /// Failure creating the output container
    #[error("Failed to create muxer: {0}")]
    MuxerCreate(String),

    /// Failure writing the container header
    #[error("Failed to write header: {0}")]
    WriteHeader(String),

    /// Failure writing a media packet to the container
    #[error("Failed to write packet: {0}")]
    WritePacket(String),

    /// Failure writing the container trailer
    #[error("Failed to write trailer: {0}")]
    WriteTrailer(String),

    /// Failure decoding a compressed packet or resampling a frame
    #[error("Failed to decode packet: {0}")]
    DecodePacket(String),

    /// Failure encoding a PCM frame
    #[error("Failed to encode frame: {0}")]
    EncodeFrame(String),

    /// Failure reading a packet from the input container
    #[error("Failed to read frame: {0}")]
    ReadFrame(String),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, ConvertError>;

pub mod domain;
pub mod ports;
pub mod session;

pub use domain::{
    CameraFacing, CodeCorners, DecodeEvent, DecodedCode, FrameBuffer, Point, Resolution,
    ScanState, StatusSnapshot, StreamRequest,
};
pub use ports::{
    CodeResolver, FrameDecoder, MediaError, MediaResult, MediaSourceProvider, NavigationSink,
    ResolveError, VideoStream,
};
pub use session::ScanSession;

//! One operation bound to its resources.
//!
//! A task owns the operation's source and sink for its whole life. Executing
//! it consumes the task and closes owned streams whatever the outcome; a task
//! that is never executed (e.g. the engine could not be loaded) closes them
//! when dropped.

use crate::engine::ImageEngine;
use crate::error::EngineError;
use crate::io::{Bitmap, BitmapTarget, EncodedImageSink, EncodedImageSource};
use crate::options::Options;
use crate::result::SpectrumResult;

/// `'i` and `'o` are the lifetimes of borrowed input and output streams, `'t`
/// that of caller bitmaps and targets.
#[derive(Debug)]
pub(crate) enum SpectrumTask<'i, 'o, 't> {
    Decode {
        source: EncodedImageSource<'i>,
        target: &'t mut BitmapTarget,
        options: Options,
    },
    Encode {
        bitmap: &'t Bitmap,
        sink: EncodedImageSink<'o>,
        options: Options,
    },
    Transcode {
        source: EncodedImageSource<'i>,
        sink: EncodedImageSink<'o>,
        options: Options,
    },
    Transform {
        bitmap: &'t Bitmap,
        target: &'t mut BitmapTarget,
        options: Options,
    },
}

impl SpectrumTask<'_, '_, '_> {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::Decode { .. } => "decode",
            Self::Encode { .. } => "encode",
            Self::Transcode { .. } => "transcode",
            Self::Transform { .. } => "transform",
        }
    }

    /// The resolved options the engine will see.
    pub(crate) fn options(&self) -> &Options {
        match self {
            Self::Decode { options, .. }
            | Self::Encode { options, .. }
            | Self::Transcode { options, .. }
            | Self::Transform { options, .. } => options,
        }
    }

    /// Runs the task on `engine` exactly once.
    pub(crate) fn execute(self, engine: &dyn ImageEngine) -> Result<SpectrumResult, EngineError> {
        match self {
            Self::Decode {
                mut source,
                target,
                options,
            } => {
                let result = engine.decode(&mut source, target, &options);
                source.close();
                result
            }
            Self::Encode {
                bitmap,
                mut sink,
                options,
            } => {
                let result = engine.encode(bitmap, &mut sink, &options);
                sink.close();
                result
            }
            Self::Transcode {
                mut source,
                mut sink,
                options,
            } => {
                let result = engine.transcode(&mut source, &mut sink, &options);
                source.close();
                sink.close();
                result
            }
            Self::Transform {
                bitmap,
                target,
                options,
            } => engine.transform(bitmap, target, &options),
        }
    }
}

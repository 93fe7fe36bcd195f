//! Media-producing pipelines and their binding to session tracks.

pub mod binder;
pub mod source;

use crate::error::PipelineError;
use crate::peer::connection::SampleSink;
use crate::peer::types::Codec;
use log::debug;
use std::fmt;
use std::sync::Arc;

pub use binder::PipelineBinder;
pub use source::{SourceDescriptor, SourcePipelineFactory};

/// Builds pipelines that push samples of one codec into a set of tracks.
pub trait PipelineFactory: Send + Sync {
    fn create(
        &self,
        codec: Codec,
        sinks: Vec<Arc<dyn SampleSink>>,
        source: &str,
    ) -> Result<Box<dyn MediaPipeline>, PipelineError>;
}

pub trait MediaPipeline: Send {
    fn start(&mut self) -> Result<(), PipelineError>;

    fn stop(&mut self);
}

/// Owned handle to a bound pipeline. Dropping it stops the pipeline.
pub struct PipelineHandle {
    codec: Codec,
    source: String,
    pipeline: Box<dyn MediaPipeline>,
    running: bool,
}

impl PipelineHandle {
    pub(crate) fn new(codec: Codec, source: &str, pipeline: Box<dyn MediaPipeline>) -> Self {
        Self {
            codec,
            source: source.to_owned(),
            pipeline,
            running: false,
        }
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub(crate) fn start(&mut self) -> Result<(), PipelineError> {
        if self.running {
            return Err(PipelineError::AlreadyRunning);
        }
        self.pipeline.start()?;
        self.running = true;
        Ok(())
    }

    pub fn stop(&mut self) {
        if self.running {
            debug!("stopping {} pipeline fed by '{}'", self.codec, self.source);
            self.pipeline.stop();
            self.running = false;
        }
    }
}

impl Drop for PipelineHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for PipelineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineHandle")
            .field("codec", &self.codec)
            .field("source", &self.source)
            .field("running", &self.running)
            .finish()
    }
}

/// Failures surfaced by the grading renderer.
#[derive(Debug, thiserror::Error)]
pub enum RendererError {
    /// No accelerated context could be created for the requested canvas.
    #[error("accelerated rendering unavailable: {0}")]
    Unavailable(String),
    /// A shader stage failed to compile; `log` carries the compiler output.
    #[error("failed to compile {stage} shader:\n{log}")]
    ShaderCompile { stage: &'static str, log: String },
    /// The program failed to link into a render pipeline.
    #[error("failed to link grading program:\n{log}")]
    ShaderLink { log: String },
    /// The device context was lost and has not been restored yet.
    #[error("rendering context lost")]
    ContextLost,
    /// The renderer has been disposed.
    #[error("renderer has been disposed")]
    Disposed,
    /// Reading pixels back from the drawable failed.
    #[error("frame readback failed: {0}")]
    Readback(String),
}

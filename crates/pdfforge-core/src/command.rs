//! Job commands
//!
//! A [`JobCommand`] carries one request's named inputs and runs the whole
//! pipeline against a [`Workspace`]: validate, open a job, stage inputs,
//! open sources, assemble, write and verify, read back, dispose.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::convert::convert_images;
use crate::document::Document;
use crate::error::AssembleError;
use crate::merge::merge_documents;
use crate::range::{PageBound, RequestedRange};
use crate::source::{PageSource, Source};
use crate::split::split_document;
use crate::workspace::{Job, Retention, Workspace};
use crate::writer::write_document;

const NO_FILE: &str = "No file uploaded";
const MISSING_BOUNDS: &str = "Invalid or missing start_page or end_page values";

/// One uploaded buffer and the name the client gave it
#[derive(Debug, Clone, Deserialize)]
pub struct NamedInput {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl NamedInput {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum JobCommand {
    Merge {
        files: Vec<NamedInput>,
    },
    Split {
        file: Option<NamedInput>,
        start_page: Option<PageBound>,
        end_page: Option<PageBound>,
    },
    Convert {
        images: Vec<NamedInput>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct JobMetrics {
    pub input_size_bytes: usize,
    pub output_size_bytes: usize,
    pub page_count: u32,
    pub processing_time_ms: u64,
}

/// Result of a completed job
#[derive(Debug, Clone)]
pub struct JobOutput {
    pub job_id: String,
    /// File name to present the result under
    pub file_name: &'static str,
    pub bytes: Vec<u8>,
    /// Where the artifact stays, if it was retained
    pub retained_at: Option<PathBuf>,
    pub metrics: JobMetrics,
}

impl JobCommand {
    pub fn operation(&self) -> &'static str {
        match self {
            JobCommand::Merge { .. } => "merge",
            JobCommand::Split { .. } => "split",
            JobCommand::Convert { .. } => "convert",
        }
    }

    pub fn artifact_name(&self) -> &'static str {
        match self {
            JobCommand::Merge { .. } => "merged.pdf",
            JobCommand::Split { .. } => "split.pdf",
            JobCommand::Convert { .. } => "converted.pdf",
        }
    }

    fn input_size(&self) -> usize {
        match self {
            JobCommand::Merge { files: inputs } | JobCommand::Convert { images: inputs } => {
                inputs.iter().map(|i| i.bytes.len()).sum()
            }
            JobCommand::Split { file, .. } => file.as_ref().map(|f| f.bytes.len()).unwrap_or(0),
        }
    }

    /// Checks that need no I/O. Returns the split range, if any.
    ///
    /// An empty `files` or `images` list is how an absent upload field
    /// arrives from a form, so it is reported as `MissingInput`.
    /// `EmptyInputSet` is left to the assemblers, for sets that are empty
    /// after the command has been accepted.
    fn validate(&self) -> Result<Option<RequestedRange>, AssembleError> {
        match self {
            JobCommand::Merge { files } if files.is_empty() => Err(missing("No files uploaded")),
            JobCommand::Convert { images } if images.is_empty() => {
                Err(missing("No images uploaded"))
            }
            JobCommand::Merge { .. } | JobCommand::Convert { .. } => Ok(None),
            JobCommand::Split {
                file,
                start_page,
                end_page,
            } => {
                if file.is_none() {
                    return Err(missing(NO_FILE));
                }
                match (start_page, end_page) {
                    (Some(start), Some(end)) => RequestedRange::parse(start, end).map(Some),
                    _ => Err(missing(MISSING_BOUNDS)),
                }
            }
        }
    }

    /// Run the command in a fresh job. Validation failures return before
    /// any job directory exists; every later failure disposes the job.
    #[instrument(skip(self, workspace), fields(operation = self.operation()))]
    pub fn execute(
        self,
        workspace: &Workspace,
        retention: Retention,
    ) -> Result<JobOutput, AssembleError> {
        let started = Instant::now();
        let range = self.validate()?;

        let operation = self.operation();
        let file_name = self.artifact_name();
        let input_size_bytes = self.input_size();

        let mut job = workspace.open_job()?;
        let job_id = job.id().to_string();

        let (page_count, bytes) = match run_in_job(self, &mut job, range) {
            Ok(written) => written,
            Err(e) => {
                job.dispose(Retention::Dispose);
                return Err(e);
            }
        };

        let retained_at = match retention {
            Retention::KeepArtifact => job.artifact().map(|p| p.to_path_buf()),
            Retention::Dispose => None,
        };
        job.dispose(retention);

        let metrics = JobMetrics {
            input_size_bytes,
            output_size_bytes: bytes.len(),
            page_count,
            processing_time_ms: started.elapsed().as_millis() as u64,
        };

        info!(
            job_id = %job_id,
            operation,
            pages = metrics.page_count,
            input_bytes = metrics.input_size_bytes,
            output_bytes = metrics.output_size_bytes,
            elapsed_ms = metrics.processing_time_ms,
            "job complete"
        );

        Ok(JobOutput {
            job_id,
            file_name,
            bytes,
            retained_at,
            metrics,
        })
    }
}

/// Stage, assemble and write; returns the page count and artifact bytes
fn run_in_job(
    command: JobCommand,
    job: &mut Job,
    range: Option<RequestedRange>,
) -> Result<(u32, Vec<u8>), AssembleError> {
    let file_name = command.artifact_name();

    let document = match command {
        JobCommand::Merge { files } => {
            let sources = stage_and_open(job, files)?;
            merge_documents(&sources)?
        }
        JobCommand::Split { file, .. } => {
            let input = file.ok_or_else(|| missing(NO_FILE))?;
            let range = range.ok_or_else(|| missing(MISSING_BOUNDS))?;
            let source = stage_and_open(job, vec![input])?
                .pop()
                .ok_or_else(|| missing(NO_FILE))?;
            split_document(&source, range.resolve(source.page_count())?)?
        }
        JobCommand::Convert { images } => {
            let images = stage_and_open(job, images)?
                .into_iter()
                .map(Source::into_image)
                .collect::<Result<Vec<_>, _>>()?;
            convert_images(&images)?
        }
    };

    write_artifact(job, document, file_name)
}

fn stage_and_open(job: &mut Job, inputs: Vec<NamedInput>) -> Result<Vec<Source>, AssembleError> {
    let mut handles = Vec::with_capacity(inputs.len());
    for input in &inputs {
        handles.push(job.stage(&input.name, &input.bytes)?);
    }
    drop(inputs);

    handles
        .iter()
        .map(|handle| Source::open(handle.original_name(), &handle.read()?))
        .collect()
}

fn missing(message: &str) -> AssembleError {
    AssembleError::MissingInput(message.to_string())
}

fn write_artifact(
    job: &mut Job,
    document: Document,
    file_name: &str,
) -> Result<(u32, Vec<u8>), AssembleError> {
    let target = job.finalize(file_name)?;
    let artifact = write_document(document, &target)?;
    let bytes = fs::read(&artifact.path)
        .map_err(|e| AssembleError::serialization("read back", e))?;
    Ok((artifact.page_count, bytes))
}

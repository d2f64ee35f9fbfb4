use taskdeck_shared::TaskDocumentDto;
use tracing::{debug, error, info, instrument};

use crate::api::{DocumentUpload, TaskApi};
use crate::dashboard::{Confirm, DashboardError};

/// Attachments of a single task. Each task
/// card owns one of these, so loads for
/// different tasks never share state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDocuments {
    task_id: u64,
    documents: Vec<TaskDocumentDto>,
    last_error: Option<String>,
}

impl TaskDocuments {
    pub fn new(task_id: u64) -> Self {
        Self {
            task_id,
            documents: Vec::new(),
            last_error: None,
        }
    }

    pub fn task_id(&self) -> u64 {
        self.task_id
    }

    pub fn documents(&self) -> &[TaskDocumentDto] {
        &self.documents
    }

    pub fn document(&self, doc_id: u64) -> Option<&TaskDocumentDto> {
        self.documents.iter().find(|doc| doc.id == doc_id)
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn surface(&mut self, err: DashboardError) -> DashboardError {
        error!(task_id = self.task_id, error = %err, "document operation failed");
        self.last_error = Some(err.to_string());
        err
    }

    #[instrument(skip(self, api), fields(task_id = self.task_id))]
    pub async fn refresh<A>(&mut self, api: &A) -> Result<&[TaskDocumentDto], DashboardError>
    where
        A: TaskApi,
    {
        match api.list_documents(self.task_id).await {
            Ok(documents) => {
                debug!(total = documents.len(), "documents loaded");
                self.documents = documents;
                self.last_error = None;
                Ok(&self.documents)
            }
            Err(err) => Err(self.surface(err.into())),
        }
    }

    #[instrument(skip(self, api, upload), fields(task_id = self.task_id, file_name = %upload.file_name))]
    pub async fn upload<A>(
        &mut self,
        api: &A,
        upload: DocumentUpload,
    ) -> Result<TaskDocumentDto, DashboardError>
    where
        A: TaskApi,
    {
        match api.upload_document(self.task_id, upload).await {
            Ok(doc) => {
                info!(doc_id = doc.id, size = ?doc.size, "document uploaded");
                self.documents.push(doc.clone());
                self.last_error = None;
                Ok(doc)
            }
            Err(err) => Err(self.surface(err.into())),
        }
    }

    #[instrument(skip(self, api), fields(task_id = self.task_id))]
    pub async fn download<A>(
        &mut self,
        api: &A,
        doc_id: u64,
    ) -> Result<(TaskDocumentDto, Vec<u8>), DashboardError>
    where
        A: TaskApi,
    {
        let Some(doc) = self.document(doc_id).cloned() else {
            return Err(self.surface(DashboardError::UnknownDocument(doc_id)));
        };

        match api.download_document(&doc).await {
            Ok(bytes) => {
                debug!(doc_id, size = bytes.len(), "document downloaded");
                Ok((doc, bytes))
            }
            Err(err) => Err(self.surface(err.into())),
        }
    }

    #[instrument(skip(self, api, confirm), fields(task_id = self.task_id))]
    pub async fn remove<A, C>(
        &mut self,
        api: &A,
        doc_id: u64,
        confirm: &mut C,
    ) -> Result<(), DashboardError>
    where
        A: TaskApi,
        C: Confirm + ?Sized,
    {
        let Some(name) = self.document(doc_id).map(|doc| doc.original_name.clone()) else {
            return Err(self.surface(DashboardError::UnknownDocument(doc_id)));
        };

        if !confirm.confirm(&format!("Delete document \"{name}\"?")) {
            debug!(doc_id, "document delete declined");
            return Err(DashboardError::Cancelled);
        }

        match api.delete_document(doc_id).await {
            Ok(()) => {
                self.documents.retain(|doc| doc.id != doc_id);
                info!(doc_id, "document deleted");
                Ok(())
            }
            Err(err) => Err(self.surface(err.into())),
        }
    }
}

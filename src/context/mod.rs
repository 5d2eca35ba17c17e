use async_trait::async_trait;

/// External wiki/document collaborator: given a user question, hand back any
/// business-context text worth appending to the prompt.
#[async_trait]
pub trait BusinessContextProvider: Send + Sync {
    fn is_configured(&self) -> bool;
    async fn context_for(&self, query: &str) -> Option<String>;
}

/// External uploaded-file collaborator: resolve a file id to its extracted
/// text, if the file still exists.
#[async_trait]
pub trait FileContextProvider: Send + Sync {
    async fn content_for(&self, file_id: &str) -> Option<String>;
}

/// Default no-op collaborator used when no wiki integration is configured.
pub struct NoBusinessContext;

#[async_trait]
impl BusinessContextProvider for NoBusinessContext {
    fn is_configured(&self) -> bool {
        false
    }

    async fn context_for(&self, _query: &str) -> Option<String> {
        None
    }
}

/// Default no-op collaborator used when file uploads are disabled.
pub struct NoFileContext;

#[async_trait]
impl FileContextProvider for NoFileContext {
    async fn content_for(&self, _file_id: &str) -> Option<String> {
        None
    }
}

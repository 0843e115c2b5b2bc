/// Produces free text from a prompt
pub trait Generator: Send + Sync {
    fn model_name(&self) -> &str;

    fn generate(&self, prompt: &str) -> crate::Result<String>;
}

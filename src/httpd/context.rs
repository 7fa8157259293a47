use {crate::decoder::LoanDecoder, std::sync::Arc};

#[derive(Clone)]
pub struct Context {
    /// Decodes loan NFT data. A process in production, a stub in tests.
    pub decoder: Arc<dyn LoanDecoder>,
}

impl Context {
    pub fn new<D>(decoder: D) -> Self
    where
        D: LoanDecoder + 'static,
    {
        Self {
            decoder: Arc::new(decoder),
        }
    }
}

mod qbatch;

pub use qbatch::QbatchAdapter;

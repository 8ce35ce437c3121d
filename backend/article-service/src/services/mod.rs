pub mod admin;
pub mod assembler;
pub mod ingestion;
pub mod pages;
pub mod pagination;
pub mod projection;
pub mod rank_resolver;
pub mod sampler;
pub mod search;

pub use assembler::{Assembler, FallbackOrder, RankedSequence};
pub use ingestion::{BatchPayload, IngestionReport, IngestionService, RankUpdate};
pub use pages::PageService;
pub use pagination::{paginate, Page, PageRequest};
pub use projection::{ProjectionDescriptor, Projector};
pub use sampler::{ArticleSampler, ThreadRngSampler};

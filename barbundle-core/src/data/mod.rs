//! Symbol resolution, series sources, and normalization

pub mod filter;
pub mod normalize;
pub mod resolver;
pub mod schema;
pub mod source;

pub use filter::{SeriesFilter, SessionFilter, TradingCalendar, ValidBarsFilter, WeekdayCalendar};
pub use normalize::{normalize, ColumnMapping, NormalizeError, NormalizedSeries, SeriesNormalizer};
pub use resolver::{DirectoryResolver, ListResolver, ResolvedDirectory};
pub use schema::{BarSchema, SchemaError};
pub use source::{Downloader, DownloaderSource, Fetched, FileSource, RawSeries, SeriesSource};

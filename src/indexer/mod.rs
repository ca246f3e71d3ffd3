pub mod assembler;
pub mod crawler;
pub mod module_cache;
pub mod module_resolver;
pub mod walker;

pub use assembler::ReferenceAssembler;
pub use crawler::{CompileQueue, CrawlResult, ReferenceCrawler};
pub use module_cache::{parse_module_name, ModuleNameCache};
pub use module_resolver::{module_relative_path, ModuleResolver, ResolvedModule};
pub use walker::{is_entry_file, SourceWalker};

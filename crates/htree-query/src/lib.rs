//! ECSQL query construction, the query executor capability, and
//! row-limited query execution (§4.2, §4.3, §6).

pub mod executor;
pub mod filter;
pub mod query;
pub mod runner;
pub mod select;

pub use executor::{ExecutorError, QueryExecutor, QueryOptions};
pub use filter::{
    compile_filter, CompiledFilter, FilterCompileError, FilterOperator, FilterRuleGroup,
    GenericInstanceFilter, PropertyFilterRule, RelatedInstanceDescription, RelatedInstanceStep,
};
pub use query::{Bindings, Cte, Query, Row, RowLimit};
pub use runner::{QueryRunner, RunnerError};
pub use select::{FilteringCte, NodeSelectQueryFactory, FILTERING_COLUMNS, SELECT_COLUMNS};

//! Predefined analytics queries over one tenant file.
//!
//! Each call fetches the records and mappings once, resolves columns for the
//! query's analysis type (falling back to a secondary analysis type's mapping
//! for cross-cutting fields), and hands an immutable snapshot to the
//! aggregation engine. Absent files and mappings produce the query's empty
//! result with a [`EmptyReason`]; only store failures and plan/catalog
//! mismatches are errors.

use log::{debug, info};
use serde::Serialize;

use crate::{
    aggregate::{
        AggregationPlan, AmountSource, DateRange, Granularity, Page, PreparedPlan, Reduction,
        SortKey,
    },
    catalog::{AnalysisType, Catalog, fields},
    data::{Record, available_columns},
    error::{EngineError, EngineResult},
    identity::IdentityStrategy,
    mapping::{ColumnMapping, FileId, TenantId},
    normalize::CONTACT_PLACEHOLDER,
    resolver::ResolvedColumnSet,
    results::{EmptyReason, RangeBuckets, RankedList, ScalarTotals},
    store::{MappingStore, RowStore},
};

/// Analysis type whose mapping supplies cross-cutting fields for `analysis`.
pub fn secondary_analysis(analysis: AnalysisType) -> AnalysisType {
    match analysis {
        AnalysisType::Customer | AnalysisType::Product => AnalysisType::Order,
        AnalysisType::Order => AnalysisType::Customer,
    }
}

fn customer_identity() -> IdentityStrategy {
    IdentityStrategy::new(
        Some(fields::CUSTOMER_ID),
        Some(fields::CUSTOMER_NAME),
        Some(fields::PHONE),
    )
}

fn product_identity() -> IdentityStrategy {
    IdentityStrategy::new(
        Some(fields::PRODUCT_ID),
        Some(fields::PRODUCT_NAME),
        Some(fields::WEIGHT),
    )
}

fn extended_amount() -> AmountSource {
    AmountSource::Extended {
        price: fields::PRICE.to_string(),
        quantity: fields::QUANTITY.to_string(),
    }
}

fn total_amount() -> AmountSource {
    AmountSource::Field(fields::TOTAL_AMOUNT.to_string())
}

pub fn top_customers_plan() -> AggregationPlan {
    AggregationPlan::new(AnalysisType::Customer, customer_identity())
        .amount_from(total_amount())
        .dated_by(fields::ORDER_DATE)
        .display_name(fields::CUSTOMER_NAME)
        .extra(fields::EMAIL, CONTACT_PLACEHOLDER)
        .extra(fields::PHONE, CONTACT_PLACEHOLDER)
        .extra(fields::CITY, CONTACT_PLACEHOLDER)
}

pub fn top_products_plan() -> AggregationPlan {
    AggregationPlan::new(AnalysisType::Product, product_identity())
        .require(fields::PRODUCT_NAME)
        .amount_from(total_amount())
        .amount_from(extended_amount())
        .units_from(fields::QUANTITY)
        .display_name(fields::PRODUCT_NAME)
        .extra(fields::CATEGORY, CONTACT_PLACEHOLDER)
}

fn total_sales_plan() -> AggregationPlan {
    AggregationPlan::new(
        AnalysisType::Order,
        IdentityStrategy::new(Some(fields::ORDER_ID), None, None),
    )
    .amount_from(total_amount())
    .amount_from(extended_amount())
    .require_amount()
}

fn total_orders_plan() -> AggregationPlan {
    AggregationPlan::new(
        AnalysisType::Order,
        IdentityStrategy::new(Some(fields::ORDER_ID), None, None),
    )
}

fn orders_in_range_plan() -> AggregationPlan {
    AggregationPlan::new(
        AnalysisType::Order,
        IdentityStrategy::new(Some(fields::ORDER_ID), None, None),
    )
    .amount_from(total_amount())
    .amount_from(extended_amount())
    .dated_by(fields::ORDER_DATE)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankedQuery {
    TopCustomers,
    TopProducts,
}

impl RankedQuery {
    pub fn plan(&self) -> AggregationPlan {
        match self {
            RankedQuery::TopCustomers => top_customers_plan(),
            RankedQuery::TopProducts => top_products_plan(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RankedQuery::TopCustomers => "top_customers",
            RankedQuery::TopProducts => "top_products",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TotalQuery {
    Sales,
    Orders,
    Customers,
    Products,
}

impl TotalQuery {
    pub fn plan(&self) -> AggregationPlan {
        match self {
            TotalQuery::Sales => total_sales_plan(),
            TotalQuery::Orders => total_orders_plan(),
            TotalQuery::Customers => AggregationPlan::new(AnalysisType::Customer, customer_identity()),
            TotalQuery::Products => AggregationPlan::new(AnalysisType::Product, product_identity()),
        }
    }

    pub fn reduction(&self) -> Reduction {
        match self {
            TotalQuery::Sales => Reduction::SumAmount,
            TotalQuery::Orders => Reduction::DistinctOrRowCount,
            TotalQuery::Customers | TotalQuery::Products => Reduction::DistinctIdentities,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TotalQuery::Sales => "total_sales",
            TotalQuery::Orders => "total_orders",
            TotalQuery::Customers => "total_customers",
            TotalQuery::Products => "total_products",
        }
    }
}

/// Columns, mapping presence and per-field resolution of one file.
#[derive(Debug, Clone, Serialize)]
pub struct ResolutionReport {
    pub analysis_type: AnalysisType,
    pub mapping_present: bool,
    pub columns: Vec<String>,
    pub resolved: ResolvedColumnSet,
}

struct Snapshot {
    records: Vec<Record>,
    resolved: ResolvedColumnSet,
}

pub struct Analytics<R, M> {
    rows: R,
    mappings: M,
    catalog: Catalog,
    record_cap: Option<usize>,
}

impl<R: RowStore, M: MappingStore> Analytics<R, M> {
    pub fn new(rows: R, mappings: M) -> Self {
        Self {
            rows,
            mappings,
            catalog: Catalog::builtin(),
            record_cap: None,
        }
    }

    pub fn with_catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Hands at most `cap` records of a file to the engine.
    pub fn with_record_cap(mut self, cap: Option<usize>) -> Self {
        self.record_cap = cap;
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    fn fetch_records(&self, tenant: &TenantId, file: &FileId) -> EngineResult<Option<Vec<Record>>> {
        let records = self
            .rows
            .list_records(tenant, file)
            .map_err(EngineError::Store)?;
        Ok(records.map(|mut records| {
            if let Some(cap) = self.record_cap
                && records.len() > cap
            {
                debug!("Capping {} record(s) at {cap}", records.len());
                records.truncate(cap);
            }
            records
        }))
    }

    fn fetch_mapping(
        &self,
        tenant: &TenantId,
        file: &FileId,
        analysis: AnalysisType,
    ) -> EngineResult<Option<ColumnMapping>> {
        self.mappings
            .get_mapping(tenant, file, analysis)
            .map_err(EngineError::Store)
    }

    fn snapshot(
        &self,
        tenant: &TenantId,
        file: &FileId,
        analysis: AnalysisType,
    ) -> EngineResult<Result<Snapshot, EmptyReason>> {
        let Some(records) = self.fetch_records(tenant, file)? else {
            return Ok(Err(EmptyReason::FileAbsent));
        };
        let Some(primary) = self.fetch_mapping(tenant, file, analysis)? else {
            return Ok(Err(EmptyReason::MappingAbsent));
        };
        let secondary = self.fetch_mapping(tenant, file, secondary_analysis(analysis))?;
        let columns = available_columns(&records);
        let resolved = ResolvedColumnSet::build(
            &self.catalog,
            analysis,
            &primary,
            secondary.as_ref(),
            &columns,
        );
        Ok(Ok(Snapshot { records, resolved }))
    }

    /// Resolution diagnostics for a file. An absent mapping is reported and
    /// resolution proceeds with an empty one, so the heuristic result shows.
    pub fn resolution(
        &self,
        tenant: &TenantId,
        file: &FileId,
        analysis: AnalysisType,
    ) -> EngineResult<Option<ResolutionReport>> {
        let Some(records) = self.fetch_records(tenant, file)? else {
            return Ok(None);
        };
        let primary = self.fetch_mapping(tenant, file, analysis)?;
        let secondary = self.fetch_mapping(tenant, file, secondary_analysis(analysis))?;
        let mapping_present = primary.is_some();
        let primary = primary
            .unwrap_or_else(|| ColumnMapping::new(tenant.clone(), file.clone(), analysis));
        let columns = available_columns(&records);
        let resolved = ResolvedColumnSet::build(
            &self.catalog,
            analysis,
            &primary,
            secondary.as_ref(),
            &columns,
        );
        Ok(Some(ResolutionReport {
            analysis_type: analysis,
            mapping_present,
            columns,
            resolved,
        }))
    }

    fn with_prepared<T>(
        &self,
        tenant: &TenantId,
        file: &FileId,
        plan: &AggregationPlan,
        empty: impl FnOnce(EmptyReason) -> T,
        run: impl FnOnce(&PreparedPlan<'_>, &[Record]) -> T,
    ) -> EngineResult<T> {
        plan.validate(&self.catalog)?;
        let snapshot = match self.snapshot(tenant, file, plan.analysis_type)? {
            Ok(snapshot) => snapshot,
            Err(reason) => {
                info!("{tenant}/{file}: {reason}");
                return Ok(empty(reason));
            }
        };
        match plan.prepare(&snapshot.resolved) {
            Ok(prepared) => Ok(run(&prepared, &snapshot.records)),
            Err(reason) => {
                info!("{tenant}/{file}: {reason}");
                Ok(empty(reason))
            }
        }
    }

    pub fn ranked(
        &self,
        query: RankedQuery,
        tenant: &TenantId,
        file: &FileId,
        sort: SortKey,
        page: Page,
    ) -> EngineResult<RankedList> {
        let plan = query.plan();
        let list = self.with_prepared(
            tenant,
            file,
            &plan,
            |reason| RankedList::empty(reason, page.limit),
            |prepared, records| prepared.rank(records, sort, page),
        )?;
        info!(
            "{} for {tenant}/{file}: {} of {} entities",
            query.name(),
            list.rows.len(),
            list.total_entities
        );
        Ok(list)
    }

    pub fn top_customers(
        &self,
        tenant: &TenantId,
        file: &FileId,
        sort: SortKey,
        page: Page,
    ) -> EngineResult<RankedList> {
        self.ranked(RankedQuery::TopCustomers, tenant, file, sort, page)
    }

    pub fn top_products(
        &self,
        tenant: &TenantId,
        file: &FileId,
        sort: SortKey,
        page: Page,
    ) -> EngineResult<RankedList> {
        self.ranked(RankedQuery::TopProducts, tenant, file, sort, page)
    }

    pub fn total(&self, query: TotalQuery, tenant: &TenantId, file: &FileId) -> EngineResult<ScalarTotals> {
        let plan = query.plan();
        let totals = self.with_prepared(
            tenant,
            file,
            &plan,
            ScalarTotals::empty,
            |prepared, records| prepared.totals(records, query.reduction()),
        )?;
        info!(
            "{} for {tenant}/{file}: {} over {} row(s)",
            query.name(),
            totals.total,
            totals.row_count
        );
        Ok(totals)
    }

    pub fn total_sales(&self, tenant: &TenantId, file: &FileId) -> EngineResult<ScalarTotals> {
        self.total(TotalQuery::Sales, tenant, file)
    }

    pub fn total_orders(&self, tenant: &TenantId, file: &FileId) -> EngineResult<ScalarTotals> {
        self.total(TotalQuery::Orders, tenant, file)
    }

    pub fn total_customers(&self, tenant: &TenantId, file: &FileId) -> EngineResult<ScalarTotals> {
        self.total(TotalQuery::Customers, tenant, file)
    }

    pub fn total_products(&self, tenant: &TenantId, file: &FileId) -> EngineResult<ScalarTotals> {
        self.total(TotalQuery::Products, tenant, file)
    }

    pub fn orders_in_range(
        &self,
        tenant: &TenantId,
        file: &FileId,
        range: &DateRange,
        granularity: Granularity,
    ) -> EngineResult<RangeBuckets> {
        let plan = orders_in_range_plan();
        let buckets = self.with_prepared(
            tenant,
            file,
            &plan,
            RangeBuckets::empty,
            |prepared, records| prepared.range(records, range, granularity),
        )?;
        info!(
            "orders_in_range for {tenant}/{file}: {} bucket(s) from {} row(s)",
            buckets.rows.len(),
            buckets.row_count
        );
        Ok(buckets)
    }
}

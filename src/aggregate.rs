//! Aggregation engine.
//!
//! An [`AggregationPlan`] names the canonical fields an aggregation needs:
//! required fields, the identity cascade, where amounts, units and dates
//! come from, and which attributes to display. [`AggregationPlan::prepare`]
//! binds the plan to a [`ResolvedColumnSet`] once per file; the resulting
//! [`PreparedPlan`] then makes a single linear pass over the records for
//! ranked lists, scalar totals, or date-range buckets.
//!
//! Per-record failures never abort a pass. A value that fails normalization
//! contributes nothing to its sum or date maximum, and a record with a blank
//! required field is skipped for this aggregation only.

use std::{
    cmp::Ordering,
    collections::{BTreeMap, HashMap},
    fmt,
    str::FromStr,
};

use anyhow::anyhow;
use chrono::NaiveDate;
use log::debug;

use crate::{
    catalog::{AnalysisType, Catalog},
    data::{RawValue, Record},
    error::{EngineError, EngineResult},
    identity::{IdentityKey, IdentityStrategy, identity},
    normalize::{Coerced, quantity_or_single_unit, to_amount, to_date, to_display_string},
    resolver::ResolvedColumnSet,
    results::{EmptyReason, RangeBuckets, RangeRow, RankedList, RankedRow, ScalarTotals},
};

static NULL: RawValue = RawValue::Null;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AmountSource {
    Field(String),
    /// `price * quantity`, with an invalid or missing quantity counting as one.
    Extended { price: String, quantity: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayPolicy {
    #[default]
    FirstSeen,
    Latest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayField {
    pub field: String,
    pub placeholder: String,
}

#[derive(Debug, Clone)]
pub struct AggregationPlan {
    pub analysis_type: AnalysisType,
    pub required: Vec<String>,
    pub identity: IdentityStrategy,
    /// Candidate amount sources; the first one that resolves is used for the
    /// whole pass.
    pub amount: Vec<AmountSource>,
    pub amount_required: bool,
    pub units: Option<String>,
    pub date: Option<String>,
    pub display_name: Option<String>,
    pub extras: Vec<DisplayField>,
    pub display_policy: DisplayPolicy,
}

impl AggregationPlan {
    pub fn new(analysis_type: AnalysisType, identity: IdentityStrategy) -> Self {
        Self {
            analysis_type,
            required: Vec::new(),
            identity,
            amount: Vec::new(),
            amount_required: false,
            units: None,
            date: None,
            display_name: None,
            extras: Vec::new(),
            display_policy: DisplayPolicy::FirstSeen,
        }
    }

    pub fn require(mut self, field: &str) -> Self {
        self.required.push(field.to_string());
        self
    }

    pub fn amount_from(mut self, source: AmountSource) -> Self {
        self.amount.push(source);
        self
    }

    pub fn require_amount(mut self) -> Self {
        self.amount_required = true;
        self
    }

    pub fn units_from(mut self, field: &str) -> Self {
        self.units = Some(field.to_string());
        self
    }

    pub fn dated_by(mut self, field: &str) -> Self {
        self.date = Some(field.to_string());
        self
    }

    pub fn display_name(mut self, field: &str) -> Self {
        self.display_name = Some(field.to_string());
        self
    }

    pub fn extra(mut self, field: &str, placeholder: &str) -> Self {
        self.extras.push(DisplayField {
            field: field.to_string(),
            placeholder: placeholder.to_string(),
        });
        self
    }

    pub fn prefer_latest(mut self) -> Self {
        self.display_policy = DisplayPolicy::Latest;
        self
    }

    fn referenced_fields(&self) -> Vec<&str> {
        let mut fields = self.required.iter().map(String::as_str).collect::<Vec<_>>();
        fields.extend(self.identity.fields());
        for source in &self.amount {
            match source {
                AmountSource::Field(field) => fields.push(field),
                AmountSource::Extended { price, quantity } => {
                    fields.push(price);
                    fields.push(quantity);
                }
            }
        }
        fields.extend(self.units.as_deref());
        fields.extend(self.date.as_deref());
        fields.extend(self.display_name.as_deref());
        fields.extend(self.extras.iter().map(|extra| extra.field.as_str()));
        fields
    }

    /// Checks that every field the plan references exists in the catalog for
    /// the plan's analysis type.
    pub fn validate(&self, catalog: &Catalog) -> EngineResult<()> {
        for field in self.referenced_fields() {
            catalog.spec(self.analysis_type, field)?;
        }
        Ok(())
    }

    /// Binds the plan to one file's resolved columns, or explains why the
    /// aggregation has nothing to show for this file.
    pub fn prepare<'a>(
        &'a self,
        resolved: &'a ResolvedColumnSet,
    ) -> Result<PreparedPlan<'a>, EmptyReason> {
        let mut required_columns = Vec::with_capacity(self.required.len());
        for field in &self.required {
            match resolved.column(field) {
                Some(column) => required_columns.push(column),
                None => {
                    debug!("Required field '{field}' is unresolved; returning empty result");
                    return Err(EmptyReason::RequiredFieldUnresolved {
                        field: field.clone(),
                    });
                }
            }
        }

        let amount = self
            .amount
            .iter()
            .find_map(|source| ResolvedAmount::bind(source, resolved));
        match &amount {
            Some(bound) => debug!("Amount source: {bound}"),
            None if self.amount_required => return Err(EmptyReason::NoAmountColumns),
            None => debug!("No amount source resolved; amounts will be zero"),
        }

        let extras = self
            .extras
            .iter()
            .map(|extra| {
                (
                    extra.field.as_str(),
                    resolved.column(&extra.field),
                    extra.placeholder.as_str(),
                )
            })
            .collect();

        Ok(PreparedPlan {
            plan: self,
            resolved,
            required_columns,
            amount,
            units_column: self.units.as_deref().and_then(|f| resolved.column(f)),
            date_column: self.date.as_deref().and_then(|f| resolved.column(f)),
            name_column: self.display_name.as_deref().and_then(|f| resolved.column(f)),
            extras,
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum ResolvedAmount<'a> {
    Field(&'a str),
    Extended {
        price: &'a str,
        quantity: Option<&'a str>,
    },
}

impl<'a> ResolvedAmount<'a> {
    fn bind(source: &AmountSource, resolved: &'a ResolvedColumnSet) -> Option<Self> {
        match source {
            AmountSource::Field(field) => resolved.column(field).map(ResolvedAmount::Field),
            AmountSource::Extended { price, quantity } => {
                resolved
                    .column(price)
                    .map(|price| ResolvedAmount::Extended {
                        price,
                        quantity: resolved.column(quantity),
                    })
            }
        }
    }
}

impl fmt::Display for ResolvedAmount<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedAmount::Field(column) => write!(f, "column '{column}'"),
            ResolvedAmount::Extended {
                price,
                quantity: Some(quantity),
            } => write!(f, "'{price}' x '{quantity}'"),
            ResolvedAmount::Extended {
                price,
                quantity: None,
            } => write!(f, "'{price}' x 1"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Day,
    Month,
    Year,
}

impl Granularity {
    pub fn bucket_key(&self, date: NaiveDate) -> String {
        let fmt = match self {
            Granularity::Day => "%Y-%m-%d",
            Granularity::Month => "%Y-%m",
            Granularity::Year => "%Y",
        };
        date.format(fmt).to_string()
    }
}

impl FromStr for Granularity {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "day" | "daily" => Ok(Granularity::Day),
            "month" | "monthly" => Ok(Granularity::Month),
            "year" | "yearly" => Ok(Granularity::Year),
            other => Err(anyhow!(
                "Unknown granularity '{other}'. Supported values: day, month, year"
            )),
        }
    }
}

/// Inclusive date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> EngineResult<Self> {
        if start > end {
            return Err(EngineError::InvalidDateRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grouping {
    Entity,
    Period(Granularity),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BucketKey {
    Entity(IdentityKey),
    Period(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntityBucket {
    pub key: BucketKey,
    pub display: String,
    pub total_count: u64,
    pub total_amount: f64,
    pub units: f64,
    pub last_seen: Option<NaiveDate>,
    pub extras: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassStats {
    pub rows_scanned: u64,
    pub rows_admitted: u64,
    pub rows_missing_required: u64,
    pub rows_without_identity: u64,
    pub rows_without_date: u64,
    pub rows_outside_range: u64,
    pub rows_aggregated: u64,
    pub invalid_amounts: u64,
    pub invalid_dates: u64,
}

#[derive(Debug, Clone)]
pub struct Accumulation {
    /// Buckets in first-encountered order.
    pub buckets: Vec<EntityBucket>,
    pub stats: PassStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    /// `(-amount, -count)`
    #[default]
    AmountThenCount,
    /// `(-count, -amount)`
    CountThenAmount,
    /// `(-units, -amount)`
    UnitsThenAmount,
    /// `(-last_seen, -amount)`
    LastSeen,
}

impl SortKey {
    fn compare(&self, a: &EntityBucket, b: &EntityBucket) -> Ordering {
        match self {
            SortKey::AmountThenCount => b
                .total_amount
                .total_cmp(&a.total_amount)
                .then_with(|| b.total_count.cmp(&a.total_count)),
            SortKey::CountThenAmount => b
                .total_count
                .cmp(&a.total_count)
                .then_with(|| b.total_amount.total_cmp(&a.total_amount)),
            SortKey::UnitsThenAmount => b
                .units
                .total_cmp(&a.units)
                .then_with(|| b.total_amount.total_cmp(&a.total_amount)),
            SortKey::LastSeen => b
                .last_seen
                .cmp(&a.last_seen)
                .then_with(|| b.total_amount.total_cmp(&a.total_amount)),
        }
    }
}

impl FromStr for SortKey {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "amount" => Ok(SortKey::AmountThenCount),
            "count" => Ok(SortKey::CountThenAmount),
            "units" => Ok(SortKey::UnitsThenAmount),
            "recent" | "last_seen" => Ok(SortKey::LastSeen),
            other => Err(anyhow!(
                "Unknown sort key '{other}'. Supported values: amount, count, units, recent"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Page {
    pub offset: usize,
    pub limit: Option<usize>,
}

impl Page {
    pub fn first(limit: usize) -> Self {
        Self {
            offset: 0,
            limit: Some(limit),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    SumAmount,
    CountRows,
    DistinctIdentities,
    /// Distinct identities when an identity field resolves, rows otherwise.
    DistinctOrRowCount,
}

#[derive(Debug, Clone)]
pub struct PreparedPlan<'a> {
    plan: &'a AggregationPlan,
    resolved: &'a ResolvedColumnSet,
    required_columns: Vec<&'a str>,
    amount: Option<ResolvedAmount<'a>>,
    units_column: Option<&'a str>,
    date_column: Option<&'a str>,
    name_column: Option<&'a str>,
    extras: Vec<(&'a str, Option<&'a str>, &'a str)>,
}

impl<'a> PreparedPlan<'a> {
    fn cell<'r>(record: &'r Record, column: &str) -> &'r RawValue {
        record.get(column).unwrap_or(&NULL)
    }

    fn admits(&self, record: &Record) -> bool {
        self.required_columns
            .iter()
            .all(|column| !Self::cell(record, column).is_blank())
    }

    fn amount(&self, record: &Record) -> Option<Coerced<f64>> {
        let amount = match self.amount? {
            ResolvedAmount::Field(column) => to_amount(Self::cell(record, column)),
            ResolvedAmount::Extended { price, quantity } => {
                match to_amount(Self::cell(record, price)) {
                    Coerced::Valid(price) => {
                        let quantity = quantity.and_then(|column| record.get(column));
                        Coerced::Valid(price * quantity_or_single_unit(quantity))
                    }
                    Coerced::Invalid => Coerced::Invalid,
                }
            }
        };
        Some(amount)
    }

    fn units(&self, record: &Record) -> f64 {
        quantity_or_single_unit(self.units_column.and_then(|column| record.get(column)))
    }

    fn date(&self, record: &Record) -> Option<Coerced<NaiveDate>> {
        self.date_column
            .map(|column| to_date(Self::cell(record, column)))
    }

    fn display_for(&self, key: &BucketKey, record: &Record) -> (String, BTreeMap<String, String>) {
        let display = match key {
            BucketKey::Period(period) => return (period.clone(), BTreeMap::new()),
            BucketKey::Entity(identity) => self
                .name_column
                .and_then(|column| record.text(column))
                .unwrap_or_else(|| identity.to_string()),
        };
        let extras = self
            .extras
            .iter()
            .map(|(field, column, placeholder)| {
                let raw = column.and_then(|column| record.get(column));
                (field.to_string(), to_display_string(raw, placeholder))
            })
            .collect();
        (display, extras)
    }

    pub fn identity_resolvable(&self) -> bool {
        self.plan.identity.is_resolvable(self.resolved)
    }

    /// One linear pass over `records`, grouping by entity identity or by
    /// date period. With `range`, records whose date is invalid or outside
    /// the range are skipped before grouping.
    pub fn accumulate(
        &self,
        records: &[Record],
        grouping: Grouping,
        range: Option<&DateRange>,
    ) -> Accumulation {
        let mut buckets: Vec<EntityBucket> = Vec::new();
        let mut index: HashMap<BucketKey, usize> = HashMap::new();
        let mut stats = PassStats::default();

        for record in records {
            stats.rows_scanned += 1;
            if !self.admits(record) {
                stats.rows_missing_required += 1;
                continue;
            }
            stats.rows_admitted += 1;

            let date = self.date(record);
            if matches!(date, Some(Coerced::Invalid)) {
                stats.invalid_dates += 1;
            }
            let date = date.and_then(Coerced::valid);
            if let Some(range) = range {
                match date {
                    None => {
                        stats.rows_without_date += 1;
                        continue;
                    }
                    Some(day) if !range.contains(day) => {
                        stats.rows_outside_range += 1;
                        continue;
                    }
                    Some(_) => {}
                }
            }

            let key = match grouping {
                Grouping::Entity => {
                    match identity(record, self.resolved, &self.plan.identity) {
                        Some(key) => BucketKey::Entity(key),
                        None => {
                            stats.rows_without_identity += 1;
                            continue;
                        }
                    }
                }
                Grouping::Period(granularity) => match date {
                    Some(day) => BucketKey::Period(granularity.bucket_key(day)),
                    None => {
                        stats.rows_without_date += 1;
                        continue;
                    }
                },
            };

            let amount = match self.amount(record) {
                Some(Coerced::Valid(value)) => value,
                Some(Coerced::Invalid) => {
                    stats.invalid_amounts += 1;
                    0.0
                }
                None => 0.0,
            };
            let units = self.units(record);

            let slot = match index.get(&key) {
                Some(&slot) => {
                    if self.plan.display_policy == DisplayPolicy::Latest {
                        let (display, extras) = self.display_for(&key, record);
                        let bucket = &mut buckets[slot];
                        bucket.display = display;
                        bucket.extras = extras;
                    }
                    slot
                }
                None => {
                    let (display, extras) = self.display_for(&key, record);
                    buckets.push(EntityBucket {
                        key: key.clone(),
                        display,
                        total_count: 0,
                        total_amount: 0.0,
                        units: 0.0,
                        last_seen: None,
                        extras,
                    });
                    index.insert(key, buckets.len() - 1);
                    buckets.len() - 1
                }
            };

            let bucket = &mut buckets[slot];
            bucket.total_count += 1;
            bucket.total_amount += amount;
            bucket.units += units;
            if let Some(day) = date
                && bucket.last_seen.is_none_or(|seen| day > seen)
            {
                bucket.last_seen = Some(day);
            }
            stats.rows_aggregated += 1;
        }

        debug!(
            "Pass over {} row(s): {} aggregated into {} bucket(s), {} without identity, {} missing required fields",
            stats.rows_scanned,
            stats.rows_aggregated,
            buckets.len(),
            stats.rows_without_identity,
            stats.rows_missing_required
        );
        debug!(
            "Pass filters: {} without date, {} outside range, {} invalid date(s), {} invalid amount(s)",
            stats.rows_without_date,
            stats.rows_outside_range,
            stats.invalid_dates,
            stats.invalid_amounts
        );
        Accumulation { buckets, stats }
    }

    /// Ranked entity list, stable-sorted by `sort` and paginated by `page`.
    pub fn rank(&self, records: &[Record], sort: SortKey, page: Page) -> RankedList {
        if !self.identity_resolvable() {
            return RankedList::empty(EmptyReason::NoIdentityColumns, page.limit);
        }
        let Accumulation { mut buckets, .. } = self.accumulate(records, Grouping::Entity, None);
        let total_entities = buckets.len();
        buckets.sort_by(|a, b| sort.compare(a, b));
        let with_units = self.units_column.is_some();
        let rows = buckets
            .into_iter()
            .skip(page.offset)
            .take(page.limit.unwrap_or(usize::MAX))
            .map(|bucket| RankedRow {
                identity_display: bucket.display,
                count: bucket.total_count,
                amount: bucket.total_amount,
                units: with_units.then_some(bucket.units),
                last_seen: bucket.last_seen,
                extras: bucket.extras,
            })
            .collect();
        RankedList {
            rows,
            limit_applied: page.limit.unwrap_or(total_entities),
            total_entities,
            reason: None,
        }
    }

    /// Scalar reduction over the whole file.
    pub fn totals(&self, records: &[Record], reduction: Reduction) -> ScalarTotals {
        match reduction {
            Reduction::SumAmount | Reduction::CountRows => {
                let mut row_count = 0u64;
                let mut sum = 0.0;
                for record in records.iter().filter(|record| self.admits(record)) {
                    row_count += 1;
                    if let Some(Coerced::Valid(amount)) = self.amount(record) {
                        sum += amount;
                    }
                }
                let total = match reduction {
                    Reduction::SumAmount => sum,
                    _ => row_count as f64,
                };
                ScalarTotals {
                    total,
                    row_count,
                    reason: None,
                }
            }
            Reduction::DistinctIdentities => {
                if !self.identity_resolvable() {
                    return ScalarTotals::empty(EmptyReason::NoIdentityColumns);
                }
                let accumulation = self.accumulate(records, Grouping::Entity, None);
                ScalarTotals {
                    total: accumulation.buckets.len() as f64,
                    row_count: accumulation.stats.rows_admitted,
                    reason: None,
                }
            }
            Reduction::DistinctOrRowCount => {
                let reduction = if self.identity_resolvable() {
                    Reduction::DistinctIdentities
                } else {
                    Reduction::CountRows
                };
                self.totals(records, reduction)
            }
        }
    }

    /// Amount and count per period for records dated within `range`.
    pub fn range(
        &self,
        records: &[Record],
        range: &DateRange,
        granularity: Granularity,
    ) -> RangeBuckets {
        if self.date_column.is_none() {
            let field = self.plan.date.clone().unwrap_or_else(|| "date".to_string());
            return RangeBuckets::empty(EmptyReason::RequiredFieldUnresolved { field });
        }
        let accumulation = self.accumulate(records, Grouping::Period(granularity), Some(range));
        let mut rows = accumulation
            .buckets
            .into_iter()
            .map(|bucket| RangeRow {
                bucket_key: bucket.display,
                total_amount: bucket.total_amount,
                count: bucket.total_count,
            })
            .collect::<Vec<_>>();
        rows.sort_by(|a, b| a.bucket_key.cmp(&b.bucket_key));
        RangeBuckets {
            rows,
            row_count: accumulation.stats.rows_admitted,
            reason: None,
        }
    }
}

/// Resolves, accumulates, sorts and limits in one call.
pub fn aggregate(
    records: &[Record],
    resolved: &ResolvedColumnSet,
    plan: &AggregationPlan,
    sort: SortKey,
    page: Page,
) -> RankedList {
    match plan.prepare(resolved) {
        Ok(prepared) => prepared.rank(records, sort, page),
        Err(reason) => RankedList::empty(reason, page.limit),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        catalog::fields,
        normalize::CONTACT_PLACEHOLDER,
        resolver::Resolution,
    };

    fn resolved(pairs: &[(&str, &str)]) -> ResolvedColumnSet {
        ResolvedColumnSet::from_resolutions(
            AnalysisType::Customer,
            pairs
                .iter()
                .map(|(field, column)| {
                    (
                        field.to_string(),
                        Resolution::ExactAlias(column.to_string()),
                    )
                })
                .collect::<Vec<_>>(),
        )
    }

    fn customer_plan() -> AggregationPlan {
        AggregationPlan::new(
            AnalysisType::Customer,
            IdentityStrategy::new(
                Some(fields::CUSTOMER_ID),
                Some(fields::CUSTOMER_NAME),
                Some(fields::PHONE),
            ),
        )
        .amount_from(AmountSource::Field(fields::TOTAL_AMOUNT.to_string()))
        .dated_by(fields::ORDER_DATE)
        .display_name(fields::CUSTOMER_NAME)
        .extra(fields::PHONE, CONTACT_PLACEHOLDER)
    }

    fn row(name: &str, total: &str) -> Record {
        Record::from_pairs([("Name", name), ("Total", total)])
    }

    #[test]
    fn sums_amounts_per_identity() {
        let columns = resolved(&[
            (fields::CUSTOMER_NAME, "Name"),
            (fields::TOTAL_AMOUNT, "Total"),
        ]);
        let records = vec![row("Ann", "1,000"), row("Ann", "250.5")];
        let list = aggregate(&records, &columns, &customer_plan(), SortKey::default(), Page::default());
        assert_eq!(list.rows.len(), 1);
        assert_eq!(list.rows[0].identity_display, "Ann");
        assert_eq!(list.rows[0].count, 2);
        assert_eq!(list.rows[0].amount, 1250.5);
        assert_eq!(list.rows[0].extras.get("phone").map(String::as_str), Some("-"));
    }

    #[test]
    fn invalid_amounts_count_rows_but_not_money() {
        let columns = resolved(&[(fields::TOTAL_AMOUNT, "Total")]);
        let plan = customer_plan();
        let prepared = plan.prepare(&columns).expect("prepared");
        let records = vec![
            row("a", "10"),
            row("b", "oops"),
            row("c", "5.5"),
            row("d", "n/a"),
        ];
        let totals = prepared.totals(&records, Reduction::SumAmount);
        assert_eq!(totals.row_count, 4);
        assert_eq!(totals.total, 15.5);
    }

    #[test]
    fn ties_keep_first_encountered_order() {
        let columns = resolved(&[
            (fields::CUSTOMER_NAME, "Name"),
            (fields::TOTAL_AMOUNT, "Total"),
        ]);
        let records = vec![
            row("Zed", "5"),
            row("Amy", "5"),
            row("Big", "9"),
            row("Max", "5"),
        ];
        let list = aggregate(&records, &columns, &customer_plan(), SortKey::default(), Page::default());
        let order = list
            .rows
            .iter()
            .map(|row| row.identity_display.as_str())
            .collect::<Vec<_>>();
        assert_eq!(order, vec!["Big", "Zed", "Amy", "Max"]);
    }

    #[test]
    fn count_breaks_amount_ties() {
        let columns = resolved(&[
            (fields::CUSTOMER_NAME, "Name"),
            (fields::TOTAL_AMOUNT, "Total"),
        ]);
        let records = vec![row("One", "10"), row("Two", "4"), row("Two", "6")];
        let list = aggregate(&records, &columns, &customer_plan(), SortKey::default(), Page::default());
        assert_eq!(list.rows[0].identity_display, "Two");
        assert_eq!(list.rows[1].identity_display, "One");
    }

    #[test]
    fn pagination_reports_limit_and_total() {
        let columns = resolved(&[
            (fields::CUSTOMER_NAME, "Name"),
            (fields::TOTAL_AMOUNT, "Total"),
        ]);
        let records = (1..=5)
            .map(|n| row(&format!("c{n}"), &n.to_string()))
            .collect::<Vec<_>>();
        let page = Page {
            offset: 1,
            limit: Some(2),
        };
        let list = aggregate(&records, &columns, &customer_plan(), SortKey::default(), page);
        assert_eq!(list.total_entities, 5);
        assert_eq!(list.limit_applied, 2);
        let names = list
            .rows
            .iter()
            .map(|row| row.identity_display.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["c4", "c3"]);
    }

    #[test]
    fn unresolved_required_field_short_circuits() {
        let columns = resolved(&[(fields::TOTAL_AMOUNT, "Total")]);
        let plan = customer_plan().require(fields::ORDER_DATE);
        let list = aggregate(&[row("Ann", "1")], &columns, &plan, SortKey::default(), Page::first(10));
        assert!(list.rows.is_empty());
        assert_eq!(
            list.reason,
            Some(EmptyReason::RequiredFieldUnresolved {
                field: fields::ORDER_DATE.to_string()
            })
        );
        assert_eq!(list.limit_applied, 10);
    }

    #[test]
    fn blank_required_values_skip_only_that_record() {
        let columns = resolved(&[
            (fields::CUSTOMER_NAME, "Name"),
            (fields::TOTAL_AMOUNT, "Total"),
        ]);
        let plan = customer_plan().require(fields::TOTAL_AMOUNT);
        let prepared = plan.prepare(&columns).expect("prepared");
        let records = vec![row("Ann", "3"), row("Bob", " "), row("Cy", "2")];
        let accumulation = prepared.accumulate(&records, Grouping::Entity, None);
        assert_eq!(accumulation.buckets.len(), 2);
        assert_eq!(accumulation.stats.rows_missing_required, 1);
    }

    #[test]
    fn identity_without_resolved_columns_is_empty() {
        let columns = resolved(&[(fields::TOTAL_AMOUNT, "Total")]);
        let list = aggregate(&[row("Ann", "1")], &columns, &customer_plan(), SortKey::default(), Page::default());
        assert_eq!(list.reason, Some(EmptyReason::NoIdentityColumns));
    }

    #[test]
    fn range_pass_counts_rows_it_filters_out() {
        let columns = resolved(&[
            (fields::TOTAL_AMOUNT, "Total"),
            (fields::ORDER_DATE, "Date"),
        ]);
        let plan = customer_plan();
        let prepared = plan.prepare(&columns).expect("prepared");
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).expect("start"),
            NaiveDate::from_ymd_opt(2024, 1, 31).expect("end"),
        )
        .expect("range");
        let records = vec![
            Record::from_pairs([("Total", "5"), ("Date", "2024-01-05")]),
            Record::from_pairs([("Total", "7"), ("Date", "2023-12-31")]),
            Record::from_pairs([("Total", "9"), ("Date", "garbage")]),
        ];
        let accumulation =
            prepared.accumulate(&records, Grouping::Period(Granularity::Day), Some(&range));
        assert_eq!(accumulation.stats.rows_aggregated, 1);
        assert_eq!(accumulation.stats.rows_outside_range, 1);
        assert_eq!(accumulation.stats.invalid_dates, 1);
        assert_eq!(accumulation.stats.rows_without_date, 1);
    }

    #[test]
    fn last_seen_tracks_latest_valid_date() {
        let columns = resolved(&[
            (fields::CUSTOMER_NAME, "Name"),
            (fields::ORDER_DATE, "Date"),
        ]);
        let records = vec![
            Record::from_pairs([("Name", "Ann"), ("Date", "2024-03-01")]),
            Record::from_pairs([("Name", "Ann"), ("Date", "garbage")]),
            Record::from_pairs([("Name", "Ann"), ("Date", "2024-01-15")]),
        ];
        let list = aggregate(&records, &columns, &customer_plan(), SortKey::default(), Page::default());
        assert_eq!(list.rows[0].count, 3);
        assert_eq!(list.rows[0].last_seen, NaiveDate::from_ymd_opt(2024, 3, 1));
    }

    #[test]
    fn display_policy_controls_which_record_names_the_bucket() {
        let columns = resolved(&[
            (fields::CUSTOMER_ID, "Id"),
            (fields::CUSTOMER_NAME, "Name"),
        ]);
        let records = vec![
            Record::from_pairs([("Id", "7"), ("Name", "A. Smith")]),
            Record::from_pairs([("Id", "7"), ("Name", "Alice Smith")]),
        ];
        let first = aggregate(&records, &columns, &customer_plan(), SortKey::default(), Page::default());
        assert_eq!(first.rows[0].identity_display, "A. Smith");
        let latest = aggregate(
            &records,
            &columns,
            &customer_plan().prefer_latest(),
            SortKey::default(),
            Page::default(),
        );
        assert_eq!(latest.rows[0].identity_display, "Alice Smith");
    }

    #[test]
    fn extended_amount_multiplies_price_by_quantity() {
        let columns = ResolvedColumnSet::from_resolutions(
            AnalysisType::Product,
            [
                (fields::PRODUCT_NAME.to_string(), Resolution::ExactAlias("Item".to_string())),
                (fields::PRICE.to_string(), Resolution::ExactAlias("Price".to_string())),
                (fields::QUANTITY.to_string(), Resolution::ExactAlias("Qty".to_string())),
            ],
        );
        let plan = AggregationPlan::new(
            AnalysisType::Product,
            IdentityStrategy::new(None, Some(fields::PRODUCT_NAME), None),
        )
        .amount_from(AmountSource::Field(fields::TOTAL_AMOUNT.to_string()))
        .amount_from(AmountSource::Extended {
            price: fields::PRICE.to_string(),
            quantity: fields::QUANTITY.to_string(),
        })
        .units_from(fields::QUANTITY)
        .display_name(fields::PRODUCT_NAME);
        let records = vec![
            Record::from_pairs([("Item", "Tea"), ("Price", "2.5"), ("Qty", "4")]),
            Record::from_pairs([("Item", "Tea"), ("Price", "2.5"), ("Qty", "?")]),
            Record::from_pairs([("Item", "Tea"), ("Price", "free"), ("Qty", "3")]),
        ];
        let list = aggregate(&records, &columns, &plan, SortKey::UnitsThenAmount, Page::default());
        assert_eq!(list.rows[0].amount, 12.5);
        assert_eq!(list.rows[0].units, Some(8.0));
        assert_eq!(list.rows[0].count, 3);
    }

    #[test]
    fn range_groups_by_period_and_keeps_raw_row_count() {
        let columns = resolved(&[
            (fields::ORDER_DATE, "Date"),
            (fields::TOTAL_AMOUNT, "Total"),
        ]);
        let plan = customer_plan();
        let prepared = plan.prepare(&columns).expect("prepared");
        let records = vec![
            Record::from_pairs([("Date", "2024-02-10"), ("Total", "5")]),
            Record::from_pairs([("Date", "2024-01-20"), ("Total", "1,000")]),
            Record::from_pairs([("Date", "2024-01-03"), ("Total", "x")]),
            Record::from_pairs([("Date", "2023-12-31"), ("Total", "7")]),
        ];
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
        )
        .unwrap();
        let buckets = prepared.range(&records, &range, Granularity::Month);
        assert_eq!(buckets.row_count, 4);
        assert_eq!(
            buckets.rows,
            vec![
                RangeRow {
                    bucket_key: "2024-01".to_string(),
                    total_amount: 1000.0,
                    count: 2,
                },
                RangeRow {
                    bucket_key: "2024-02".to_string(),
                    total_amount: 5.0,
                    count: 1,
                },
            ]
        );
    }

    #[test]
    fn distinct_or_row_count_falls_back_to_rows() {
        let columns = resolved(&[(fields::TOTAL_AMOUNT, "Total")]);
        let plan = customer_plan();
        let prepared = plan.prepare(&columns).expect("prepared");
        let records = vec![row("a", "1"), row("a", "2")];
        let totals = prepared.totals(&records, Reduction::DistinctOrRowCount);
        assert_eq!(totals.total, 2.0);
        let distinct = prepared.totals(&records, Reduction::DistinctIdentities);
        assert_eq!(distinct.reason, Some(EmptyReason::NoIdentityColumns));
    }

    #[test]
    fn invalid_date_ranges_are_rejected() {
        let start = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert!(matches!(
            DateRange::new(start, end),
            Err(EngineError::InvalidDateRange { .. })
        ));
    }

    #[test]
    fn plan_validation_rejects_fields_outside_the_catalog() {
        let plan = customer_plan().extra(fields::WEIGHT, "-");
        let err = plan.validate(&Catalog::builtin()).expect_err("weight is a product field");
        assert!(matches!(err, EngineError::UnknownField { .. }));
        assert!(customer_plan().validate(&Catalog::builtin()).is_ok());
    }
}

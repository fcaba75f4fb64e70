//! Closed enumerations of the sub-resources fetched per company.
//!
//! The upstream API exposes chart series and schedule series addressed by
//! free-form query parameters. Modeling the known set as enums keeps the
//! "every expected key is always present" invariant a property of the type
//! rather than of runtime pre-population alone.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// One combined chart request (several metrics merged into date-keyed rows).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ChartKey {
    PriceDmaVolume,
    PeEps,
    MarginsSales,
    EvEbitda,
    Pbv,
    McapSales,
}

impl ChartKey {
    pub const ALL: [Self; 6] = [
        Self::PriceDmaVolume,
        Self::PeEps,
        Self::MarginsSales,
        Self::EvEbitda,
        Self::Pbv,
        Self::McapSales,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PriceDmaVolume => "price_dma_volume",
            Self::PeEps => "pe_eps",
            Self::MarginsSales => "margins_sales",
            Self::EvEbitda => "ev_ebitda",
            Self::Pbv => "pbv",
            Self::McapSales => "mcap_sales",
        }
    }

    /// Metric names joined into the upstream `q=` parameter.
    pub const fn metrics(self) -> &'static [&'static str] {
        match self {
            Self::PriceDmaVolume => &["Price", "DMA50", "DMA200", "Volume"],
            Self::PeEps => &["Price to Earning", "Median PE", "EPS"],
            Self::MarginsSales => &["GPM", "OPM", "NPM", "Quarter Sales"],
            Self::EvEbitda => &["EV Multiple", "Median EV Multiple", "EBITDA"],
            Self::Pbv => &["Price to book value", "Median PBV", "Book value"],
            Self::McapSales => &[
                "Market Cap to Sales",
                "Median Market Cap to Sales",
                "Sales",
            ],
        }
    }
}

impl Display for ChartKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Statement section a schedule series belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StatementSection {
    Quarters,
    ProfitLoss,
    BalanceSheet,
    CashFlow,
}

impl StatementSection {
    /// Path segment used by the schedules endpoint.
    pub const fn api_segment(self) -> &'static str {
        match self {
            Self::Quarters => "quarters",
            Self::ProfitLoss => "profit-loss",
            Self::BalanceSheet => "balance-sheet",
            Self::CashFlow => "cash-flow",
        }
    }

    /// Quarterly and P&L schedules carry percent-formatted growth rows that
    /// are normalized to fractions; balance sheet and cash flow do not.
    pub const fn percent_to_fraction(self) -> bool {
        matches!(self, Self::Quarters | Self::ProfitLoss)
    }
}

/// One schedule series. All sixteen are required for a company payload to be
/// considered complete.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum ScheduleKey {
    #[serde(rename = "sales_quarterly")]
    SalesQuarterly,
    #[serde(rename = "expenses_quarterly")]
    ExpensesQuarterly,
    #[serde(rename = "other_income_quarterly")]
    OtherIncomeQuarterly,
    #[serde(rename = "net_profit_quarterly")]
    NetProfitQuarterly,
    #[serde(rename = "sales_profit_loss")]
    SalesProfitLoss,
    #[serde(rename = "expenses_profit_loss")]
    ExpensesProfitLoss,
    #[serde(rename = "other_income_profit_loss")]
    OtherIncomeProfitLoss,
    #[serde(rename = "net_profit_profit_loss")]
    NetProfitProfitLoss,
    #[serde(rename = "material_cost_pct_profit_loss")]
    MaterialCostPctProfitLoss,
    #[serde(rename = "borrowings_balance_sheet")]
    BorrowingsBalanceSheet,
    #[serde(rename = "other_liabilities_balance_sheet")]
    OtherLiabilitiesBalanceSheet,
    #[serde(rename = "fixed_assets_balance_sheet")]
    FixedAssetsBalanceSheet,
    #[serde(rename = "other_assets_balance_sheet")]
    OtherAssetsBalanceSheet,
    #[serde(rename = "cash_from_operating_activity_cash_flow")]
    CashFromOperatingActivityCashFlow,
    #[serde(rename = "cash_from_investing_activity_cash_flow")]
    CashFromInvestingActivityCashFlow,
    #[serde(rename = "cash_from_financing_activity_cash_flow")]
    CashFromFinancingActivityCashFlow,
}

impl ScheduleKey {
    pub const ALL: [Self; 16] = [
        Self::SalesQuarterly,
        Self::ExpensesQuarterly,
        Self::OtherIncomeQuarterly,
        Self::NetProfitQuarterly,
        Self::SalesProfitLoss,
        Self::ExpensesProfitLoss,
        Self::OtherIncomeProfitLoss,
        Self::NetProfitProfitLoss,
        Self::MaterialCostPctProfitLoss,
        Self::BorrowingsBalanceSheet,
        Self::OtherLiabilitiesBalanceSheet,
        Self::FixedAssetsBalanceSheet,
        Self::OtherAssetsBalanceSheet,
        Self::CashFromOperatingActivityCashFlow,
        Self::CashFromInvestingActivityCashFlow,
        Self::CashFromFinancingActivityCashFlow,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SalesQuarterly => "sales_quarterly",
            Self::ExpensesQuarterly => "expenses_quarterly",
            Self::OtherIncomeQuarterly => "other_income_quarterly",
            Self::NetProfitQuarterly => "net_profit_quarterly",
            Self::SalesProfitLoss => "sales_profit_loss",
            Self::ExpensesProfitLoss => "expenses_profit_loss",
            Self::OtherIncomeProfitLoss => "other_income_profit_loss",
            Self::NetProfitProfitLoss => "net_profit_profit_loss",
            Self::MaterialCostPctProfitLoss => "material_cost_pct_profit_loss",
            Self::BorrowingsBalanceSheet => "borrowings_balance_sheet",
            Self::OtherLiabilitiesBalanceSheet => "other_liabilities_balance_sheet",
            Self::FixedAssetsBalanceSheet => "fixed_assets_balance_sheet",
            Self::OtherAssetsBalanceSheet => "other_assets_balance_sheet",
            Self::CashFromOperatingActivityCashFlow => "cash_from_operating_activity_cash_flow",
            Self::CashFromInvestingActivityCashFlow => "cash_from_investing_activity_cash_flow",
            Self::CashFromFinancingActivityCashFlow => "cash_from_financing_activity_cash_flow",
        }
    }

    /// Row label sent as the schedules endpoint `parent=` parameter.
    pub const fn parent(self) -> &'static str {
        match self {
            Self::SalesQuarterly | Self::SalesProfitLoss => "Sales",
            Self::ExpensesQuarterly | Self::ExpensesProfitLoss => "Expenses",
            Self::OtherIncomeQuarterly | Self::OtherIncomeProfitLoss => "Other Income",
            Self::NetProfitQuarterly | Self::NetProfitProfitLoss => "Net Profit",
            Self::MaterialCostPctProfitLoss => "Material Cost %",
            Self::BorrowingsBalanceSheet => "Borrowings",
            Self::OtherLiabilitiesBalanceSheet => "Other Liabilities",
            Self::FixedAssetsBalanceSheet => "Fixed Assets",
            Self::OtherAssetsBalanceSheet => "Other Assets",
            Self::CashFromOperatingActivityCashFlow => "Cash from Operating Activity",
            Self::CashFromInvestingActivityCashFlow => "Cash from Investing Activity",
            Self::CashFromFinancingActivityCashFlow => "Cash from Financing Activity",
        }
    }

    pub const fn section(self) -> StatementSection {
        match self {
            Self::SalesQuarterly
            | Self::ExpensesQuarterly
            | Self::OtherIncomeQuarterly
            | Self::NetProfitQuarterly => StatementSection::Quarters,
            Self::SalesProfitLoss
            | Self::ExpensesProfitLoss
            | Self::OtherIncomeProfitLoss
            | Self::NetProfitProfitLoss
            | Self::MaterialCostPctProfitLoss => StatementSection::ProfitLoss,
            Self::BorrowingsBalanceSheet
            | Self::OtherLiabilitiesBalanceSheet
            | Self::FixedAssetsBalanceSheet
            | Self::OtherAssetsBalanceSheet => StatementSection::BalanceSheet,
            Self::CashFromOperatingActivityCashFlow
            | Self::CashFromInvestingActivityCashFlow
            | Self::CashFromFinancingActivityCashFlow => StatementSection::CashFlow,
        }
    }
}

impl Display for ScheduleKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_key_set_is_complete() {
        assert_eq!(ScheduleKey::ALL.len(), 16);

        let quarters = ScheduleKey::ALL
            .iter()
            .filter(|key| key.section() == StatementSection::Quarters)
            .count();
        assert_eq!(quarters, 4);
    }

    #[test]
    fn percent_conversion_follows_section() {
        assert!(ScheduleKey::SalesQuarterly
            .section()
            .percent_to_fraction());
        assert!(ScheduleKey::MaterialCostPctProfitLoss
            .section()
            .percent_to_fraction());
        assert!(!ScheduleKey::BorrowingsBalanceSheet
            .section()
            .percent_to_fraction());
        assert!(!ScheduleKey::CashFromOperatingActivityCashFlow
            .section()
            .percent_to_fraction());
    }

    #[test]
    fn chart_metrics_join_into_query() {
        assert_eq!(
            ChartKey::PriceDmaVolume.metrics(),
            &["Price", "DMA50", "DMA200", "Volume"]
        );
    }
}

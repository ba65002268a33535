//! Registry of statement tables served by NetEase Finance.

use finreport_core::StatementTable;

macro_rules! service_url {
    ($path:literal) => {
        concat!("http://quotes.money.163.com/service/", $path)
    };
}

/// Every NetEase statement table, in download and load order.
pub static NETEASE_TABLES: &[StatementTable] = &[
    StatementTable {
        name: "key_indicators",
        file: "zycwzb",
        label: "Key financial indicators",
        url_template: service_url!("zycwzb_{code}.html?type=report"),
    },
    StatementTable {
        name: "profitability",
        file: "ylnl",
        label: "Profitability",
        url_template: service_url!("zycwzb_{code}.html?type=report&part=ylnl"),
    },
    StatementTable {
        name: "solvency",
        file: "chnl",
        label: "Solvency",
        url_template: service_url!("zycwzb_{code}.html?type=report&part=chnl"),
    },
    StatementTable {
        name: "growth",
        file: "cznl",
        label: "Growth",
        url_template: service_url!("zycwzb_{code}.html?type=report&part=cznl"),
    },
    StatementTable {
        name: "operating_capability",
        file: "yynl",
        label: "Operating capability",
        url_template: service_url!("zycwzb_{code}.html?type=report&part=yynl"),
    },
    StatementTable {
        name: "cash_flow",
        file: "xjllb",
        label: "Cash flow statement",
        url_template: service_url!("xjllb_{code}.html"),
    },
    StatementTable {
        name: "balance_sheet",
        file: "zcfzb",
        label: "Balance sheet",
        url_template: service_url!("zcfzb_{code}.html"),
    },
    StatementTable {
        name: "income_statement",
        file: "lrb",
        label: "Income statement",
        url_template: service_url!("lrb_{code}.html"),
    },
];

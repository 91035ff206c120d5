pub mod alpha_vantage;
pub mod exchangerate_host;
pub mod yahoo_finance;

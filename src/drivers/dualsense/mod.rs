pub mod driver;
pub mod hid_report;
pub mod report_descriptor;

#[cfg(test)]
mod hid_report_test;

use tabled::settings::{Panel, Rotate, Style};
use tabled::Table;

use crate::device::detect::detect;
use crate::dmi::{data::DmiData, get_dmi_data};

/// Table of the DMI data, one property per row
pub fn dmi_table(data: &DmiData) -> Table {
    let mut table = Table::new(vec![data]);
    table
        .with(Rotate::Left)
        .with(Style::modern_rounded())
        .with(Panel::header("DMI Data"));
    table
}

pub fn handle_device() {
    let data = get_dmi_data();
    println!("{}", dmi_table(&data));
    match detect(&data) {
        Some(model) => println!("Detected handheld: {model}"),
        None => println!("No supported handheld detected"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_lists_properties() {
        let data = DmiData {
            sys_vendor: "LENOVO".into(),
            product_name: "83E1".into(),
            ..Default::default()
        };
        let table = dmi_table(&data).to_string();
        assert!(table.contains("DMI Data"));
        assert!(table.contains("sys_vendor"));
        assert!(table.contains("83E1"));
    }
}

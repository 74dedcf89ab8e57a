use finval::api;
use tabled::settings::{Color, object::Columns};

#[derive(clap::Args)]
pub struct SectorsCommand;

impl SectorsCommand {
    pub async fn exec(&self) {
        let mut table_data: Vec<Vec<String>> = vec![];

        for sector_growth in api::sectors::list().await {
            table_data.push(vec![
                sector_growth.sector,
                format!("{:.2}%", sector_growth.rate * 100.0),
            ]);
        }

        let mut table = tabled::builder::Builder::from_iter(&table_data).build();
        table.modify(Columns::first(), Color::FG_GREEN);
        println!("{table}");
    }
}

pub mod mined_data;
pub mod miner;

pub use mined_data::MinedData;
pub use miner::DataMiner;

pub mod mock_output;
pub mod mock_probes;

mod discrepancies;
mod harness;
mod helpers;
mod mocks;
mod orders;
mod webhooks;

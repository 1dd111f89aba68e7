mod fees;
mod join_exit;
mod rates;
mod swap;

mod dedup;
mod integrity;
mod lifecycle;

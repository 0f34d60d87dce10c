mod classes;
mod load;
mod method_id;

pub mod code_gen_record;

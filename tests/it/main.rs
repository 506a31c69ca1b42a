mod boolean_rle;
